mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use xiso_info::{
    GameNameLookup, LookupSettings, Properties, UpdatingLookup, XIso, Xbox360Iso,
    DEFAULT_LOOKUP_FILE,
};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logger(cli.verbose);

    let input_path = cli.input;

    if cli.mode.list {
        let xiso = XIso::from_path(&input_path)
            .with_context(|| format!("Error reading ISO file {:?}", &input_path))?;
        xiso.list();
        return Ok(());
    }

    let mut parser = Xbox360Iso::new();
    if cli.update_lookup || cli.force_update {
        let settings = LookupSettings {
            local: cli.lookup.unwrap_or_else(|| PathBuf::from(DEFAULT_LOOKUP_FILE)),
            url: cli.lookup_url,
            force_update: cli.force_update,
            ..LookupSettings::default()
        };
        parser = parser.with_updating_lookup(UpdatingLookup::new(settings));
    } else if let Some(lookup) = load_lookup(cli.lookup)? {
        parser = parser.with_lookup(lookup);
    }

    let props = parser
        .parse(&input_path)
        .with_context(|| format!("Error parsing {:?}", &input_path))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&props)?);
    } else {
        print_props(&input_path, &props);
    }

    Ok(())
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// An explicitly given table must exist, the default one is optional.
fn load_lookup(path: Option<PathBuf>) -> Result<Option<GameNameLookup>> {
    let path = match path {
        Some(path) => path,
        None => {
            let path = PathBuf::from(DEFAULT_LOOKUP_FILE);
            if !path.exists() {
                debug!("no {} in working directory, skipping game names", DEFAULT_LOOKUP_FILE);
                return Ok(None);
            }
            path
        }
    };

    let lookup = GameNameLookup::from_path(&path)
        .with_context(|| format!("Error loading game name table {:?}", &path))?;
    Ok(Some(lookup))
}

fn print_props(input_path: &Path, props: &Properties) {
    println!("Properties of {:?}", input_path);
    for (key, value) in props.to_map() {
        println!("  {:<16} {}", format!("{}:", key), value);
    }
}
