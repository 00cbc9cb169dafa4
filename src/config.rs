//! Runtime configuration for the resolver binaries.
//!
//! Values come from environment variables, falling back to the files shipped
//! under the repository root (`config/mitigations.json`,
//! `config/training_data.json`). Binaries apply their own flags on top of the
//! discovered config before building the pipeline.

use crate::catalog::{HazardCategory, MitigationCatalog};
use crate::classifier::command::DEFAULT_TIMEOUT;
use crate::classifier::{Classifier, CommandClassifier, ExampleClassifier};
use crate::resolver::HazardResolver;
use crate::service::PromptService;
use crate::training::TrainingSet;
use crate::{find_repo_root, split_list};
use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CATALOG_ENV: &str = "HAZARD_CATALOG";
pub const TRAINING_DATA_ENV: &str = "HAZARD_TRAINING_DATA";
pub const CLASSIFIER_ENV: &str = "HAZARD_CLASSIFIER";
pub const CLASSIFIER_COMMAND_ENV: &str = "HAZARD_CLASSIFIER_COMMAND";
pub const CLASSIFIER_TIMEOUT_ENV: &str = "HAZARD_CLASSIFIER_TIMEOUT_MS";
pub const CLASSIFIER_CATEGORIES_ENV: &str = "HAZARD_CLASSIFIER_CATEGORIES";

pub const DEFAULT_CATALOG_PATH: &str = "config/mitigations.json";
pub const DEFAULT_TRAINING_DATA_PATH: &str = "config/training_data.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifierKind {
    /// In-process nearest-example classifier over the training data.
    Examples,
    /// External model process.
    Command {
        program: String,
        args: Vec<String>,
        timeout: Duration,
        declared: Vec<HazardCategory>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    pub catalog_path: PathBuf,
    pub training_path: PathBuf,
    pub classifier: ClassifierKind,
}

impl ResolverConfig {
    /// Read the process environment, resolving relative defaults against the
    /// repository root.
    pub fn discover() -> Result<Self> {
        let root = find_repo_root().ok();
        Self::from_lookup(root.as_deref(), |key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(root: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let default_path = |relative: &str| match root {
            Some(root) => root.join(relative),
            None => PathBuf::from(relative),
        };

        let catalog_path = var(CATALOG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_path(DEFAULT_CATALOG_PATH));
        let training_path = var(TRAINING_DATA_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_path(DEFAULT_TRAINING_DATA_PATH));

        let kind = var(CLASSIFIER_ENV).unwrap_or_else(|| "examples".to_string());
        let classifier = match kind.trim() {
            "examples" => ClassifierKind::Examples,
            "command" => {
                let command = var(CLASSIFIER_COMMAND_ENV).ok_or_else(|| {
                    anyhow!("{CLASSIFIER_ENV}=command requires {CLASSIFIER_COMMAND_ENV}")
                })?;
                let timeout = match var(CLASSIFIER_TIMEOUT_ENV) {
                    Some(raw) => parse_timeout(&raw)?,
                    None => DEFAULT_TIMEOUT,
                };
                let declared = match var(CLASSIFIER_CATEGORIES_ENV) {
                    Some(raw) => parse_categories(&raw)?,
                    None => Vec::new(),
                };
                let (program, args) = split_command(&command)?;
                ClassifierKind::Command {
                    program,
                    args,
                    timeout,
                    declared,
                }
            }
            other => bail!("unknown {CLASSIFIER_ENV} '{other}' (expected examples|command)"),
        };

        Ok(Self {
            catalog_path,
            training_path,
            classifier,
        })
    }

    pub fn load_catalog(&self) -> Result<Arc<MitigationCatalog>> {
        MitigationCatalog::load(&self.catalog_path)
            .with_context(|| {
                format!(
                    "loading mitigation catalog from {}",
                    self.catalog_path.display()
                )
            })
            .map(Arc::new)
    }

    pub fn build_classifier(&self) -> Result<Arc<dyn Classifier>> {
        match &self.classifier {
            ClassifierKind::Examples => {
                let training = TrainingSet::load(&self.training_path)?;
                log::info!(
                    "example classifier built from {} labeled examples in {}",
                    training.len(),
                    self.training_path.display()
                );
                Ok(Arc::new(ExampleClassifier::new(&training)))
            }
            ClassifierKind::Command {
                program,
                args,
                timeout,
                declared,
            } => {
                let resolved = which::which(program)
                    .with_context(|| format!("classifier program '{program}' not found"))?;
                log::info!("command classifier uses {}", resolved.display());
                Ok(Arc::new(
                    CommandClassifier::new(resolved, args.clone())
                        .with_timeout(*timeout)
                        .with_declared_categories(declared.iter().copied()),
                ))
            }
        }
    }

    pub fn build_resolver(&self) -> Result<HazardResolver> {
        let catalog = self.load_catalog()?;
        let classifier = self.build_classifier()?;
        Ok(HazardResolver::new(classifier, catalog))
    }

    /// Build the request service; a pipeline that cannot be constructed
    /// yields a service that answers every request with the failure.
    pub fn build_service(&self) -> PromptService {
        match self.build_resolver() {
            Ok(resolver) => PromptService::new(resolver),
            Err(err) => unavailable_service(err),
        }
    }

    /// Service for the binaries: environment config with the given path
    /// overrides. Invalid settings are reported per request like any other
    /// startup failure.
    pub fn discover_service(
        catalog: Option<PathBuf>,
        training_data: Option<PathBuf>,
    ) -> PromptService {
        match Self::discover() {
            Ok(config) => config.with_paths(catalog, training_data).build_service(),
            Err(err) => unavailable_service(err),
        }
    }

    pub fn with_paths(mut self, catalog: Option<PathBuf>, training_data: Option<PathBuf>) -> Self {
        if let Some(path) = catalog {
            self.catalog_path = path;
        }
        if let Some(path) = training_data {
            self.training_path = path;
        }
        self
    }
}

fn unavailable_service(err: anyhow::Error) -> PromptService {
    log::error!("hazard pipeline unavailable: {err:#}");
    PromptService::unavailable(format!("{err:#}"))
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let millis: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{CLASSIFIER_TIMEOUT_ENV} must be milliseconds, got '{raw}'"))?;
    if millis == 0 {
        bail!("{CLASSIFIER_TIMEOUT_ENV} must be greater than zero");
    }
    Ok(Duration::from_millis(millis))
}

fn parse_categories(raw: &str) -> Result<Vec<HazardCategory>> {
    split_list(raw)
        .into_iter()
        .map(|token| {
            token
                .parse::<u32>()
                .map(HazardCategory)
                .with_context(|| format!("invalid category '{token}' in {CLASSIFIER_CATEGORIES_ENV}"))
        })
        .collect()
}

/// Split a command line on whitespace into program and arguments.
pub fn split_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("classifier command is empty"))?;
    Ok((program, parts.collect()))
}
