//! Validates a mitigation catalog and its coverage of the classifier range.
//!
//! Loads the catalog with full schema and structural validation, prints a
//! short summary, and compares the catalog against the categories the
//! configured classifier declares (or an explicit `--categories` list). Any
//! declared category without a mitigation is a configuration defect and makes
//! the check fail unless `--allow-gaps` is given. When the built-in
//! classifier is configured, its training labels must name the same
//! categories as the catalog labels.

use anyhow::{Result, anyhow, bail};
use hazard_resolver::{
    ClassifierKind, HazardCategory, MitigationCatalog, ResolverConfig, TrainingSet, init_logging,
    render_record, split_list,
};
use std::env;
use std::fmt::{self, Write};
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

fn run() -> Result<bool> {
    let args = CliArgs::parse()?;
    let config = ResolverConfig::discover()?.with_paths(args.catalog, args.training_data);

    let catalog = config.load_catalog()?;
    let declared = match args.categories {
        Some(categories) => categories,
        None => config.build_classifier()?.declared_categories(),
    };
    let gaps = catalog.coverage_gaps(declared.iter().copied());
    let conflicts = match &config.classifier {
        ClassifierKind::Examples => {
            label_conflicts(&catalog, &TrainingSet::load(&config.training_path)?)
        }
        ClassifierKind::Command { .. } => Vec::new(),
    };

    let mut output = String::new();
    let report = Report {
        declared: &declared,
        gaps: &gaps,
        conflicts: &conflicts,
    };
    render_report(&catalog, &report, args.verbose, &mut output)?;
    print!("{output}");

    Ok((gaps.is_empty() || args.allow_gaps) && conflicts.is_empty())
}

struct Report<'a> {
    declared: &'a [HazardCategory],
    gaps: &'a [HazardCategory],
    conflicts: &'a [String],
}

/// Training labels the catalog assigns to a different category. Labels the
/// catalog does not carry are coverage questions, not conflicts.
fn label_conflicts(catalog: &MitigationCatalog, training: &TrainingSet) -> Vec<String> {
    training
        .labels()
        .iter()
        .filter_map(|(label, &trained)| match catalog.category_for_label(label) {
            Some(listed) if listed != trained => {
                Some(format!("{label} (training {trained}, catalog {listed})"))
            }
            _ => None,
        })
        .collect()
}

fn render_report(
    catalog: &MitigationCatalog,
    report: &Report<'_>,
    verbose: bool,
    writer: &mut impl Write,
) -> fmt::Result {
    let Report {
        declared,
        gaps,
        conflicts,
    } = report;
    writeln!(writer, "catalog   : {} ({})", catalog.key().0, catalog.title())?;
    writeln!(writer, "categories: {}", catalog.len())?;
    for category in catalog.categories() {
        let record = catalog.lookup(category);
        writeln!(
            writer,
            "  [{}] {:<18} {} ({} risks, {} actions)",
            category,
            catalog.label(category).unwrap_or("-"),
            record.title,
            record.risks.len(),
            record.actions.len()
        )?;
        if verbose {
            for line in render_record(record).lines() {
                writeln!(writer, "      {line}")?;
            }
        }
    }
    if declared.is_empty() {
        writeln!(writer, "coverage  : classifier declares no output range")?;
    } else if gaps.is_empty() {
        writeln!(
            writer,
            "coverage  : complete for {} declared categories",
            declared.len()
        )?;
    } else {
        let missing: Vec<String> = gaps.iter().map(ToString::to_string).collect();
        writeln!(writer, "coverage  : MISSING {}", missing.join(", "))?;
    }
    if !conflicts.is_empty() {
        writeln!(writer, "labels    : CONFLICT {}", conflicts.join("; "))?;
    }
    Ok(())
}

struct CliArgs {
    catalog: Option<PathBuf>,
    training_data: Option<PathBuf>,
    categories: Option<Vec<HazardCategory>>,
    allow_gaps: bool,
    verbose: bool,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let mut parsed = CliArgs {
            catalog: None,
            training_data: None,
            categories: None,
            allow_gaps: false,
            verbose: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--catalog" => parsed.catalog = Some(PathBuf::from(next_value(&mut args, &arg)?)),
                "--training-data" => {
                    parsed.training_data = Some(PathBuf::from(next_value(&mut args, &arg)?))
                }
                "--categories" => {
                    let raw = next_value(&mut args, &arg)?;
                    let categories = split_list(&raw)
                        .into_iter()
                        .map(|token| {
                            token
                                .parse::<u32>()
                                .map(HazardCategory)
                                .map_err(|_| anyhow!("invalid category '{token}'"))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    parsed.categories = Some(categories);
                }
                "--allow-gaps" => parsed.allow_gaps = true,
                "--verbose" | "-v" => parsed.verbose = true,
                "--help" | "-h" => {
                    print!("{}", usage());
                    std::process::exit(0);
                }
                other => bail!("unknown flag: {other}\n{}", usage()),
            }
        }
        Ok(parsed)
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("missing value for {flag}"))
}

fn usage() -> &'static str {
    "Usage: catalog-check [--catalog PATH] [--training-data PATH] [--categories LIST] [--allow-gaps] [--verbose]\n\
Validates the mitigation catalog and reports declared classifier categories with no mitigation.\n"
}
