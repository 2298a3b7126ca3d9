use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the blockvault binary.
#[derive(Debug, Parser)]
#[command(
    name = "blockvault",
    version,
    about = "Load, save and guard the editable content blocks of a site"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BLOCKVAULT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// The selected command, `show` when none was given.
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Show(ShowArgs::default()))
    }
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the content that would be displayed, as JSON.
    Show(ShowArgs),
    /// Write the displayed content to a JSON file.
    Export(ExportArgs),
    /// Save content from a JSON file through the default-content gate.
    Import(ImportArgs),
    /// Report whether a JSON file would be classified as default content.
    Check(CheckArgs),
    /// Print the baseline content; persists it only when configured to.
    Reset(ResetArgs),
    /// Report whether the store currently holds trusted content.
    Sync(SyncArgs),
}

impl Command {
    pub fn overrides(&self) -> &CommonOverrides {
        match self {
            Command::Show(args) => &args.overrides,
            Command::Export(args) => &args.overrides,
            Command::Import(args) => &args.overrides,
            Command::Check(args) => &args.overrides,
            Command::Reset(args) => &args.overrides,
            Command::Sync(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Print blocks sorted by display order instead of stored sequence.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub sorted: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Path to the JSON file to write.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Path to the JSON file to import.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Wait out the debounce period instead of writing at once.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub debounced: bool,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Path to the JSON file to classify.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ResetArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}
