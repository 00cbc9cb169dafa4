//! Interactive annotation of the hazard/mitigation dataset.
//!
//! Loads the dataset named by `--file` (or `HAZARD_DATASET`), runs the menu on
//! stdin/stdout, and writes the file back only when the user picks
//! "Save and exit". Closing stdin discards the session's edits.

use anyhow::{Result, anyhow, bail};
use hazard_resolver::dataset::SessionEnd;
use hazard_resolver::{AnnotationSession, init_logging, load_dataset, save_dataset};
use std::env;
use std::io;
use std::path::PathBuf;

const DATASET_ENV: &str = "HAZARD_DATASET";

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let path = parse_args()?;
    let entries = load_dataset(&path)?;
    log::info!("loaded {} hazards from {}", entries.len(), path.display());

    let stdin = io::stdin();
    let mut session = AnnotationSession::new(entries, stdin.lock(), io::stdout());
    match session.run()? {
        SessionEnd::Saved => {
            save_dataset(&path, &session.into_entries())?;
            println!("Dataset saved successfully! Exiting.");
        }
        SessionEnd::InputClosed => {
            println!();
            log::warn!("input closed before saving; {} left unchanged", path.display());
        }
    }
    Ok(())
}

fn parse_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    let mut file = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--file" => {
                let value = args.next().ok_or_else(|| anyhow!("missing value for --file"))?;
                file = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: hazard-dataset [--file PATH]\n\
Annotates hazards lacking mitigations. PATH defaults to ${DATASET_ENV}."
                );
                std::process::exit(0);
            }
            other => bail!("unknown flag: {other}"),
        }
    }
    match file.or_else(|| env::var(DATASET_ENV).ok().filter(|v| !v.is_empty()).map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => bail!("no dataset given; pass --file PATH or set {DATASET_ENV}"),
    }
}
