use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Build and browse ZadFS disk images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create (or truncate) a disk image and format it
    Format {
        /// Disk image file
        #[arg(long, short)]
        image: PathBuf,

        /// Image length in KiB
        #[arg(long, default_value_t = 16)]
        kib: u64,
    },

    /// Format a disk image and copy every regular file of a directory into its root
    Pack {
        /// Source directory
        #[arg(long, short)]
        source: PathBuf,

        /// Disk image file
        #[arg(long, short)]
        image: PathBuf,

        /// Image length in KiB
        #[arg(long, default_value_t = 16)]
        kib: u64,
    },

    /// Interactive shell; without an image nothing is persisted
    Shell {
        /// Disk image file, formatted if missing or invalid
        #[arg(long, short)]
        image: Option<PathBuf>,
    },
}
