use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::steam::SteamLayout;

#[derive(Debug, Parser)]
#[command(name = "vdfscope")]
#[command(about = "Browse Steam controller profiles that can be imported")]
pub struct Cli {
    /// Steam installation directory (defaults to ~/.steam/steam)
    #[arg(long)]
    pub steam_path: Option<PathBuf>,

    /// Print the profile list once it is fully resolved instead of opening the TUI
    #[arg(long, default_value_t = false)]
    pub list: bool,

    /// Give up waiting for names after this many seconds (with --list)
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Extra profile file to offer for import; may be repeated
    #[arg(long = "file", action = ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// Log pipeline activity to stderr
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub layout: SteamLayout,
    pub list_only: bool,
    pub list_timeout: Duration,
    pub dropped_profiles: Vec<PathBuf>,
    pub verbose: bool,
}

impl Config {
    pub fn from_cli(cli: Cli) -> std::io::Result<Self> {
        let steam_root = match cli.steam_path {
            Some(path) => path,
            None => SteamLayout::default_root().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "cannot determine home directory; pass --steam-path",
                )
            })?,
        };

        let dropped_profiles = cli
            .files
            .into_iter()
            .map(std::fs::canonicalize)
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            layout: SteamLayout::new(steam_root),
            list_only: cli.list,
            list_timeout: Duration::from_secs(cli.timeout),
            dropped_profiles,
            verbose: cli.verbose,
        })
    }
}
