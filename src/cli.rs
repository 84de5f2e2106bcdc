use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;
use xiso_info::DEFAULT_LOOKUP_URL;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub mode: Mode,

    /// Path to the ISO or Xex file
    #[arg(name = "iso")]
    pub input: PathBuf,

    /// Print the properties as JSON
    #[arg(long)]
    pub json: bool,

    /// CSV table mapping media IDs to game names [default: GameNameLookup.csv if present]
    #[arg(long, env = "XISO_LOOKUP")]
    pub lookup: Option<PathBuf>,

    /// Download the game name table when it is missing, and again when a media ID is not in it
    #[arg(long)]
    pub update_lookup: bool,

    /// Download the game name table before the lookup even if a local copy exists
    #[arg(long)]
    pub force_update: bool,

    /// Where to download the game name table from
    #[arg(long, env = "XISO_LOOKUP_URL", default_value = DEFAULT_LOOKUP_URL)]
    pub lookup_url: String,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
pub struct Mode {
    /// Print game and disc properties (default)
    #[arg(short, long)]
    pub info: bool,

    /// List content of the ISO file
    #[arg(short, long)]
    pub list: bool,
}
