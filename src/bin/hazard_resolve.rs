//! One-shot resolver: `{"prompt"}` in, `{"response"}` / `{"error"}` out.
//!
//! Requests come from `--prompt`, a file, or stdin (single object, array, or
//! NDJSON). Each reply is printed as one compact JSON line. The process exits
//! 1 when any reply is an error so scripts can branch on the status alone.

use anyhow::{Context, Result, anyhow, bail};
use hazard_resolver::{
    PromptReply, PromptRequest, ResolverConfig, init_logging, parse_request_stream,
};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

fn main() {
    init_logging();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every request was answered without error.
fn run() -> Result<bool> {
    let args = CliArgs::parse()?;

    let requests = match &args.source {
        InputSource::Prompt(prompt) => vec![PromptRequest::new(prompt.clone())],
        InputSource::File(path) => {
            if !path.is_file() {
                bail!("input file not found: {}", path.display());
            }
            let data =
                fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            parse_request_stream(&data)?
        }
        InputSource::Stdin => {
            let mut data = String::new();
            io::stdin()
                .read_to_string(&mut data)
                .context("reading stdin")?;
            parse_request_stream(&data)?
        }
    };

    let service = ResolverConfig::discover_service(args.catalog, args.training_data)
        .with_record_detail(args.record);

    let mut all_ok = true;
    for request in &requests {
        let reply = service.answer(request);
        all_ok &= !reply.is_error();
        print_reply(&reply, args.pretty)?;
    }
    Ok(all_ok)
}

fn print_reply(reply: &PromptReply, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(reply)?
    } else {
        serde_json::to_string(reply)?
    };
    println!("{rendered}");
    Ok(())
}

enum InputSource {
    Prompt(String),
    File(PathBuf),
    Stdin,
}

struct CliArgs {
    source: InputSource,
    catalog: Option<PathBuf>,
    training_data: Option<PathBuf>,
    record: bool,
    pretty: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let mut source: Option<InputSource> = None;
        let mut catalog = None;
        let mut training_data = None;
        let mut record = false;
        let mut pretty = false;

        while let Some(arg_os) = args.next() {
            let arg = arg_os
                .into_string()
                .map_err(|_| anyhow!("argument is not valid UTF-8"))?;
            match arg.as_str() {
                "--prompt" => {
                    let value = next_value(&mut args, "--prompt")?;
                    set_source(&mut source, InputSource::Prompt(value))?;
                }
                "--file" => {
                    let value = next_value(&mut args, "--file")?;
                    set_source(&mut source, InputSource::File(PathBuf::from(value)))?;
                }
                "--stdin" => set_source(&mut source, InputSource::Stdin)?,
                "--catalog" => catalog = Some(PathBuf::from(next_value(&mut args, "--catalog")?)),
                "--training-data" => {
                    training_data = Some(PathBuf::from(next_value(&mut args, "--training-data")?))
                }
                "--record" => record = true,
                "--pretty" => pretty = true,
                "--help" | "-h" => {
                    print!("{}", usage());
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}\n{}", usage()),
            }
        }

        Ok(CliArgs {
            source: source.unwrap_or(InputSource::Stdin),
            catalog,
            training_data,
            record,
            pretty,
        })
    }
}

fn set_source(slot: &mut Option<InputSource>, value: InputSource) -> Result<()> {
    if slot.is_some() {
        bail!("--prompt/--file/--stdin may only be provided once");
    }
    *slot = Some(value);
    Ok(())
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<String> {
    args.next()
        .map(|os| {
            os.into_string()
                .map_err(|_| anyhow!("value for {flag} is not valid UTF-8"))
        })
        .transpose()?
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}

fn usage() -> &'static str {
    "Usage: hazard-resolve [--prompt TEXT|--file PATH|--stdin] [--catalog PATH] [--training-data PATH] [--record] [--pretty]\n\
Reads {\"prompt\": ...} requests (object, array, or NDJSON), resolves each to a mitigation, and prints {\"response\": ...} or {\"error\": ...} per request.\n"
}
