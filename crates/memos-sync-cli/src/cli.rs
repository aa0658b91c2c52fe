use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use memos_sync_core::FileNameFormat;

#[derive(Parser)]
#[command(name = "memos-sync")]
#[command(about = "Mirror memos and resources from a Memos server into a local folder")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the settings file
    #[arg(long, global = true, value_name = "PATH", env = "MEMOS_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Vault root the sync folder lives in (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", env = "MEMOS_SYNC_VAULT")]
    pub vault: Option<PathBuf>,

    /// Write memo bodies without the metadata header
    #[arg(long, global = true)]
    pub no_frontmatter: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync
    Sync {
        /// Print the plan without touching the vault
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync periodically until interrupted
    Watch,
    /// Show or edit settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update settings; omitted options keep their value
    Set {
        /// Memos server URL, e.g. https://memos.example.com
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
        /// Access token (pass an empty string to clear)
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// Legacy open ID (pass an empty string to clear)
        #[arg(long, value_name = "ID")]
        open_id: Option<String>,
        /// Folder inside the vault that receives memos and resources
        #[arg(long, value_name = "FOLDER")]
        folder: Option<String>,
        /// How memo files are named
        #[arg(long, value_enum)]
        format: Option<FileNameFormatArg>,
        /// Minutes between periodic syncs (0 disables)
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u32>,
    },
    /// Forget the last sync time so the next run rewrites every memo
    ResetWatermark,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum FileNameFormatArg {
    Id,
    CreatedAt,
    UpdatedAt,
    Title,
}

impl From<FileNameFormatArg> for FileNameFormat {
    fn from(value: FileNameFormatArg) -> Self {
        match value {
            FileNameFormatArg::Id => Self::Id,
            FileNameFormatArg::CreatedAt => Self::CreatedAt,
            FileNameFormatArg::UpdatedAt => Self::UpdatedAt,
            FileNameFormatArg::Title => Self::Title,
        }
    }
}
