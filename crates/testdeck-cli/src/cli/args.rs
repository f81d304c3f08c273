use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use testdeck_core::ShareLinkMode;

#[derive(Parser, Debug)]
#[command(
    name = "testdeck",
    version,
    about = "Test management reporting: validate requests, generate reports, drill into cells"
)]
pub struct Cli {
    /// Engine configuration (YAML). TESTDECK_* variables override it.
    #[arg(long, global = true, env = "TESTDECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a report request without reading any data
    Validate(ValidateArgs),
    /// Generate one page of a report
    Report(ReportArgs),
    /// List the records behind one report cell
    Drilldown(DrillDownArgs),
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[arg(long)]
    pub request: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ReportArgs {
    #[arg(long)]
    pub request: PathBuf,

    /// Dataset JSON the report reads from
    #[arg(long)]
    pub data: PathBuf,

    #[arg(long, value_enum, default_value_t = ShareArg::Authenticated)]
    pub share: ShareArg,

    /// Replace user names with User 1, User 2, ... in shared output
    #[arg(long)]
    pub anonymize: bool,
}

#[derive(Parser, Debug)]
pub struct DrillDownArgs {
    #[arg(long)]
    pub context: PathBuf,

    #[arg(long)]
    pub data: PathBuf,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Records per call; defaults to and is capped by the engine config
    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long, value_enum, default_value_t = ShareArg::Authenticated)]
    pub share: ShareArg,

    #[arg(long)]
    pub anonymize: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareArg {
    Public,
    PasswordProtected,
    Authenticated,
}

impl From<ShareArg> for ShareLinkMode {
    fn from(arg: ShareArg) -> Self {
        match arg {
            ShareArg::Public => ShareLinkMode::Public,
            ShareArg::PasswordProtected => ShareLinkMode::PasswordProtected,
            ShareArg::Authenticated => ShareLinkMode::Authenticated,
        }
    }
}
