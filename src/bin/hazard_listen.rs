//! Long-running resolver over an NDJSON request stream.
//!
//! The catalog and classifier are built once at startup; each stdin line is a
//! `{"prompt": ...}` request answered by one stdout line, flushed immediately
//! so callers can pipeline requests. Malformed lines get an `{"error"}` reply
//! and do not stop the stream.

use anyhow::{Context, Result, anyhow, bail};
use hazard_resolver::{PromptService, ResolverConfig, init_logging};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse()?;
    let service = ResolverConfig::discover_service(args.catalog, args.training_data)
        .with_record_detail(args.record);
    if let Some(resolver) = service.resolver() {
        log::info!(
            "serving catalog {} with the {} classifier",
            resolver.catalog().key().0,
            resolver.classifier().name()
        );
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let answered = serve(&service, stdin.lock(), stdout.lock())?;
    log::info!("answered {answered} requests");
    Ok(())
}

/// Answer each non-blank line of `input`; returns the number of replies.
fn serve(service: &PromptService, input: impl BufRead, mut output: impl Write) -> Result<usize> {
    let mut answered = 0;
    for line in input.lines() {
        let line = line.context("reading request stream")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = service.answer_json(&line);
        serde_json::to_writer(&mut output, &reply)?;
        output.write_all(b"\n")?;
        output.flush()?;
        answered += 1;
    }
    Ok(answered)
}

struct CliArgs {
    catalog: Option<PathBuf>,
    training_data: Option<PathBuf>,
    record: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut parsed = CliArgs {
            catalog: None,
            training_data: None,
            record: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--catalog" => {
                    let value = args.next().ok_or_else(|| anyhow!("missing value for --catalog"))?;
                    parsed.catalog = Some(PathBuf::from(value));
                }
                "--training-data" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("missing value for --training-data"))?;
                    parsed.training_data = Some(PathBuf::from(value));
                }
                "--record" => parsed.record = true,
                "--help" | "-h" => {
                    println!(
                        "Usage: hazard-listen [--catalog PATH] [--training-data PATH] [--record]\n\
Reads NDJSON {{\"prompt\": ...}} requests on stdin and writes one JSON reply per line."
                    );
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}"),
            }
        }
        Ok(parsed)
    }
}
