use bytes::Bytes;
use filestow_core::Config;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;

const DEFAULT_MAX_DIMENSION: u32 = 1024;
const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Bounds applied to every derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeOptions {
    /// Longest side of the output, in pixels. Smaller images are not upscaled.
    pub max_dimension: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

impl Default for DerivativeOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl From<&Config> for DerivativeOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_dimension: config.derivative_max_dimension.max(1),
            jpeg_quality: config.derivative_jpeg_quality.clamp(1, 100),
        }
    }
}

/// Output format for derivatives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeFormat {
    Jpeg,
    Png,
}

impl DerivativeFormat {
    pub fn to_mime_type(self) -> &'static str {
        match self {
            DerivativeFormat::Jpeg => "image/jpeg",
            DerivativeFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DerivativeFormat::Jpeg => "jpg",
            DerivativeFormat::Png => "png",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DerivativeError {
    /// The payload is not an image this build can decode.
    #[error("Failed to decode image: {0}")]
    Decode(#[source] ImageError),

    #[error("Failed to encode derivative: {0}")]
    Encode(#[source] ImageError),

    #[error("Derivative task failed: {0}")]
    Task(String),
}

/// A re-encoded, size-bounded copy of an uploaded image.
#[derive(Debug, Clone)]
pub struct Derivative {
    pub bytes: Bytes,
    pub format: DerivativeFormat,
    pub width: u32,
    pub height: u32,
}

impl Derivative {
    /// Decode `data`, shrink it to fit `options.max_dimension` and re-encode.
    pub fn generate(data: &[u8], options: &DerivativeOptions) -> Result<Self, DerivativeError> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| DerivativeError::Decode(ImageError::IoError(e)))?
            .decode()
            .map_err(DerivativeError::Decode)?;

        let (width, height) = img.dimensions();
        let bounded = if width.max(height) > options.max_dimension {
            img.resize(options.max_dimension, options.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        let format = if has_meaningful_alpha(&bounded) {
            DerivativeFormat::Png
        } else {
            DerivativeFormat::Jpeg
        };

        let bytes = match format {
            DerivativeFormat::Jpeg => encode_jpeg(&bounded, options.jpeg_quality)?,
            DerivativeFormat::Png => encode_png(&bounded)?,
        };
        let (width, height) = bounded.dimensions();

        tracing::debug!(
            original_size = data.len(),
            derivative_size = bytes.len(),
            width = width,
            height = height,
            format = format.to_mime_type(),
            "Image derivative generated"
        );

        Ok(Derivative {
            bytes,
            format,
            width,
            height,
        })
    }

    /// `generate` on the blocking thread pool.
    pub async fn generate_blocking(
        data: Bytes,
        options: DerivativeOptions,
    ) -> Result<Self, DerivativeError> {
        tokio::task::spawn_blocking(move || Self::generate(&data, &options))
            .await
            .map_err(|e| DerivativeError::Task(e.to_string()))?
    }
}

/// Whether any pixel is not fully opaque.
fn has_meaningful_alpha(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    img.to_rgba8().pixels().any(|p| p[3] < 255)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, DerivativeError> {
    let rgb = img.to_rgb8();
    let mut buffer = Vec::with_capacity((rgb.width() * rgb.height()) as usize / 4);
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(DerivativeError::Encode)?;
    Ok(Bytes::from(buffer))
}

fn encode_png(img: &DynamicImage) -> Result<Bytes, DerivativeError> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(img.to_rgba8())
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(DerivativeError::Encode)?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_large_opaque_image_becomes_bounded_jpeg() {
        let img = RgbImage::from_pixel(2048, 1024, Rgb([200, 10, 10]));
        let data = png_bytes(DynamicImage::ImageRgb8(img));

        let derivative = Derivative::generate(&data, &DerivativeOptions::default()).unwrap();
        assert_eq!(derivative.format, DerivativeFormat::Jpeg);
        assert_eq!((derivative.width, derivative.height), (1024, 512));
        assert_eq!(&derivative.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_transparent_image_stays_png() {
        let mut img = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 255, 255]));
        img.put_pixel(3, 3, Rgba([0, 0, 0, 0]));
        let data = png_bytes(DynamicImage::ImageRgba8(img));

        let derivative = Derivative::generate(&data, &DerivativeOptions::default()).unwrap();
        assert_eq!(derivative.format, DerivativeFormat::Png);
        assert_eq!(derivative.format.extension(), "png");
        assert_eq!((derivative.width, derivative.height), (64, 64));
    }

    #[test]
    fn test_opaque_rgba_is_encoded_as_jpeg() {
        let img = RgbaImage::from_pixel(10, 20, Rgba([1, 2, 3, 255]));
        let data = png_bytes(DynamicImage::ImageRgba8(img));

        let derivative = Derivative::generate(&data, &DerivativeOptions::default()).unwrap();
        assert_eq!(derivative.format, DerivativeFormat::Jpeg);
        assert_eq!((derivative.width, derivative.height), (10, 20));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let result = Derivative::generate(b"definitely not an image", &DerivativeOptions::default());
        assert!(matches!(result, Err(DerivativeError::Decode(_))));
    }

    #[tokio::test]
    async fn test_generate_blocking() {
        let img = RgbImage::from_pixel(300, 600, Rgb([9, 9, 9]));
        let data = Bytes::from(png_bytes(DynamicImage::ImageRgb8(img)));
        let options = DerivativeOptions {
            max_dimension: 100,
            jpeg_quality: 50,
        };

        let derivative = Derivative::generate_blocking(data, options).await.unwrap();
        assert_eq!((derivative.width, derivative.height), (50, 100));
    }
}
