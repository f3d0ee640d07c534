use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "galleria")]
#[command(author, version, about = "Gallery publishing back end with bulk ZIP import/export")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Import a gallery ZIP archive (the file itself is left in place)
    Import {
        /// Archive containing data.json and image assets
        #[arg(required = true)]
        archive: PathBuf,
    },

    /// Export the gallery into a ZIP archive that `import` accepts
    Export {
        /// Output archive path
        #[arg(required = true)]
        output: PathBuf,

        /// Only export images with this status (pending, approved, rejected)
        #[arg(long)]
        status: Option<String>,
    },

    /// Approve a pending image
    Approve {
        /// Image ID
        id: String,
    },

    /// Reject an image
    Reject {
        /// Image ID
        id: String,
    },

    /// Delete an image together with its tag links and references
    Delete {
        /// Image ID
        id: String,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
