use crate::parse_setting;
use clap::{Parser, Subcommand};
use filestow_core::{BackendKind, StorageTarget};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "filestow", about = "Filestow storage engine CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Storage target administration
    Targets {
        #[command(subcommand)]
        sub: TargetCommands,
    },
    /// Re-read storage targets from the configuration source
    Reload,
    /// Upload a file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Target key (defaults to the primary)
        #[arg(long)]
        target: Option<String>,
        /// Content type (guessed from the extension when absent)
        #[arg(long)]
        content_type: Option<String>,
        /// Expected MD5 of the file, hex encoded
        #[arg(long)]
        checksum: Option<String>,
    },
    /// Move a file to the trash, or purge it
    Delete {
        /// File record UUID
        id: Uuid,
        /// Skip the trash
        #[arg(long)]
        permanent: bool,
    },
    /// Restore a trashed file
    Restore {
        /// File record UUID
        id: Uuid,
    },
    /// Print the public URL of a file
    Url {
        /// File record UUID
        id: Uuid,
    },
    /// Bytes used on a target's medium
    Usage {
        /// Target key (defaults to the primary)
        #[arg(long)]
        target: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TargetCommands {
    /// List enabled targets
    List,
    /// Create or replace a target
    Upsert {
        /// Target key
        key: String,
        /// local, object_store_a (s3), object_store_b (oss) or nas
        #[arg(long)]
        backend: BackendKind,
        /// Backend setting as name=value, repeatable
        #[arg(long = "set", value_parser = parse_setting)]
        settings: Vec<(String, String)>,
        /// Make this the primary target
        #[arg(long)]
        primary: bool,
        /// Delete files immediately instead of trashing them
        #[arg(long)]
        no_trash: bool,
        /// Store the target disabled
        #[arg(long)]
        disabled: bool,
    },
    /// Remove a target that no file references
    Remove {
        /// Target key
        key: String,
    },
}

impl TargetCommands {
    /// Target described by an `upsert` invocation.
    pub fn to_target(&self) -> Option<StorageTarget> {
        let TargetCommands::Upsert {
            key,
            backend,
            settings,
            primary,
            no_trash,
            disabled,
        } = self
        else {
            return None;
        };

        let mut target = StorageTarget::new(key.clone(), *backend);
        for (name, value) in settings {
            target = target.with_setting(name.clone(), value.clone());
        }
        target.is_primary = *primary;
        target.trash_enabled = !*no_trash;
        target.enabled = !*disabled;
        Some(target)
    }
}
