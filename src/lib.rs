//! Shared library for the hazard resolver.
//!
//! The crate maps a free-text description of an unsafe condition to a
//! structured mitigation record: a [`Classifier`] assigns a hazard category
//! and a [`MitigationCatalog`] supplies the record for it. The binaries under
//! `src/bin/` wrap that pipeline in the `{"prompt"}` → `{"response"}` request
//! shape, validate catalogs, and annotate the hazard dataset.

use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod render;
pub mod resolver;
pub mod service;
pub mod training;

mod schema_loader;

pub use catalog::{
    CATALOG_SCHEMA_VERSION, CatalogKey, CategoryEntry, HazardCategory, MitigationCatalog,
    MitigationRecord, UNDEFINED_MITIGATION_TITLE,
};
pub use classifier::{
    Classification, ClassificationError, Classifier, CommandClassifier, ExampleClassifier,
};
pub use config::{ClassifierKind, ResolverConfig};
pub use dataset::{AnnotationSession, HazardEntry, load_dataset, save_dataset};
pub use render::render_record;
pub use resolver::{FallbackReason, HazardResolver, Outcome, ResolveError, Resolution};
pub use service::{PromptReply, PromptRequest, PromptService, parse_request_stream};
pub use training::{LabeledExample, TrainingSet};

const ROOT_SENTINEL: &str = "config/mitigations.json";
const ROOT_ENV: &str = "HAZARD_RESOLVER_ROOT";

/// Returns true when `candidate` looks like the repository root.
fn is_repo_root(candidate: &Path) -> bool {
    candidate.join(ROOT_SENTINEL).is_file()
}

/// Verifies that an explicit root hint points at a valid repo.
fn repo_root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !hint_path.exists() || !is_repo_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_repo_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the directory holding `config/mitigations.json`.
///
/// Honors `HAZARD_RESOLVER_ROOT` if it points at a real root, falls back to
/// climbing up from the current executable, then uses the build-time hint.
pub fn find_repo_root() -> Result<PathBuf> {
    if let Ok(env_root) = env::var(ROOT_ENV) {
        if let Some(root) = repo_root_from_hint(&env_root) {
            return Ok(root);
        }
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            if let Some(root) = search_upwards(exe_dir) {
                return Ok(root);
            }
        }
    }

    if let Some(hint) = option_env!("HAZARD_RESOLVER_ROOT_HINT") {
        if let Some(root) = repo_root_from_hint(hint) {
            return Ok(root);
        }
    }

    bail!(
        "Unable to locate the hazard resolver root ({ROOT_SENTINEL}). Set {ROOT_ENV} or HAZARD_CATALOG."
    );
}

/// Route `log` output to stderr; `RUST_LOG` overrides the `warn` default.
/// Stdout stays reserved for command output.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .try_init();
}

/// Split comma- or whitespace-delimited configuration lists into tokens.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .replace(',', " ")
        .split_whitespace()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
