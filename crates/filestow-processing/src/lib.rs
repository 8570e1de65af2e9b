//! Filestow Processing Library
//!
//! Derivative generation for uploaded images: decode, bound the longest side,
//! re-encode as JPEG (or PNG when the image carries transparency).

#[cfg(feature = "image")]
pub mod derivative;

#[cfg(feature = "image")]
pub use derivative::{Derivative, DerivativeError, DerivativeFormat, DerivativeOptions};
