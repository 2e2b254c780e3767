mod platform;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use subtitle_core::ThemePreference;

use platform::LogDestination;

/// Batch Chinese-script conversion of subtitle files through zhconvert.
#[derive(Parser, Debug)]
#[command(name = "zhconvert", version, about)]
pub(crate) struct Cli {
    /// Configuration file (RON). Defaults to ./zhconvert.ron when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Service base URL, or a proxy prefix such as http://127.0.0.1:8788/api.
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[arg(long = "log", value_enum, global = true)]
    pub log_destination: Option<LogDestination>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Run the CORS proxy in front of the conversion service.
    Serve {
        /// Address to listen on.
        #[arg(long)]
        bind: Option<String>,
        /// Upstream service base URL.
        #[arg(long)]
        upstream: Option<String>,
    },
    /// Check the service and list its converters and modules.
    Info,
    /// Convert subtitle files and write the results.
    Convert(ConvertArgs),
    /// Write a side-by-side HTML diff for one subtitle file.
    Diff(DiffArgs),
    /// Show or change the stored theme preference.
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ConversionFlags {
    /// Converter profile, e.g. Taiwan, Hongkong, China, Traditional.
    #[arg(long)]
    pub converter: Option<String>,
    /// Module override as NAME=VALUE (-1 auto, 0 off, 1 on). Repeatable.
    #[arg(long = "module", value_name = "NAME=VALUE")]
    pub modules: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ConvertArgs {
    /// Subtitle files to convert.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[command(flatten)]
    pub flags: ConversionFlags,
    /// Directory for converted files.
    #[arg(long, short)]
    pub output_dir: Option<PathBuf>,
    /// Retry failed files this many times.
    #[arg(long, default_value_t = 0)]
    pub retries: u32,
    /// Skip writing manifest.json.
    #[arg(long)]
    pub no_manifest: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DiffArgs {
    pub file: PathBuf,
    #[command(flatten)]
    pub flags: ConversionFlags,
    /// Output HTML file. Defaults to `<stem>.diff.html` in the output directory.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub(crate) enum ThemeAction {
    Show,
    Set {
        #[arg(value_parser = parse_theme)]
        theme: ThemePreference,
    },
    Cycle,
}

fn parse_theme(value: &str) -> Result<ThemePreference, String> {
    value.parse().map_err(|err: subtitle_core::ParseThemeError| err.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    platform::run(cli).await
}
