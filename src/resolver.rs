//! Free text → mitigation record.
//!
//! [`HazardResolver`] takes its classifier and catalog as constructor
//! arguments and holds no mutable state, so one instance can be cloned into
//! every request handler. Only empty input is reported as an error; a failed
//! classification or an id missing from the catalog both degrade to the
//! catalog's undefined record, and the [`Outcome`] says which path was taken.

use crate::catalog::{HazardCategory, MitigationCatalog, MitigationRecord};
use crate::classifier::{Classification, Classifier};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Caller errors surfaced by [`HazardResolver::resolve`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Prompt is required")]
    EmptyInput,
}

/// Why the undefined record was served.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The classifier could not produce a category.
    ClassificationFailed,
    /// The classifier produced a category the catalog has no entry for.
    CategoryUndefined { category: HazardCategory },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Matched {
        category: HazardCategory,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
    Fallback(FallbackReason),
}

/// A record borrowed from the catalog plus how it was reached.
#[derive(Clone, Copy, Debug)]
pub struct Resolution<'a> {
    pub record: &'a MitigationRecord,
    pub outcome: Outcome,
}

impl Resolution<'_> {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback(_))
    }
}

#[derive(Clone)]
pub struct HazardResolver {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<MitigationCatalog>,
}

impl HazardResolver {
    pub fn new(classifier: Arc<dyn Classifier>, catalog: Arc<MitigationCatalog>) -> Self {
        let declared = classifier.declared_categories();
        let gaps = catalog.coverage_gaps(declared);
        if !gaps.is_empty() {
            log::warn!(
                "catalog {} has no mitigation for {} categories {:?}; they resolve to the undefined record",
                catalog.key().0,
                classifier.name(),
                gaps
            );
        }
        Self {
            classifier,
            catalog,
        }
    }

    pub fn catalog(&self) -> &MitigationCatalog {
        &self.catalog
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn resolve(&self, text: &str) -> Result<Resolution<'_>, ResolveError> {
        if text.trim().is_empty() {
            return Err(ResolveError::EmptyInput);
        }

        match self.classifier.classify(text) {
            Ok(classification) => Ok(self.lookup(classification)),
            // Blank input was rejected above, so any classifier error here
            // (including its own EmptyInput) is a classification failure.
            Err(err) => {
                log::warn!(
                    "{} classifier failed, serving undefined mitigation: {err}",
                    self.classifier.name()
                );
                Ok(Resolution {
                    record: self.catalog.undefined(),
                    outcome: Outcome::Fallback(FallbackReason::ClassificationFailed),
                })
            }
        }
    }

    fn lookup(&self, classification: Classification) -> Resolution<'_> {
        let Classification {
            category,
            confidence,
        } = classification;
        match self.catalog.get(category) {
            Some(record) => {
                log::debug!("input classified as {category} ({confidence:?})");
                Resolution {
                    record,
                    outcome: Outcome::Matched {
                        category,
                        confidence,
                    },
                }
            }
            None => {
                log::warn!(
                    "category {category} has no entry in catalog {}",
                    self.catalog.key().0
                );
                Resolution {
                    record: self.catalog.undefined(),
                    outcome: Outcome::Fallback(FallbackReason::CategoryUndefined { category }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogKey, CategoryEntry, UNDEFINED_MITIGATION_TITLE};
    use crate::classifier::ClassificationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed answer and counts calls.
    struct FixedClassifier {
        answer: Result<u32, &'static str>,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn category(id: u32) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(id),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(message: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(message),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Classifier for FixedClassifier {
        fn classify(&self, _text: &str) -> Result<Classification, ClassificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Ok(id) => Ok(Classification::new(HazardCategory(id))),
                Err(message) => Err(ClassificationError::InferenceFailed(message.to_string())),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn catalog() -> Arc<MitigationCatalog> {
        let titles = [
            "Process failure",
            "Crane's vacuum gripper tool failure",
            "Provide proper training and safety equipment",
            "Miscommunication, Overloading, and Crane Path Obstruction",
            "Install fire alarms and have fire extinguishers accessible",
        ];
        let entries = titles.iter().enumerate().map(|(idx, title)| CategoryEntry {
            id: HazardCategory(idx as u32),
            label: None,
            mitigation: MitigationRecord::new(
                *title,
                vec![format!("risk {idx}")],
                vec![format!("action {idx}")],
            ),
        });
        Arc::new(
            MitigationCatalog::from_entries(CatalogKey("test_v1".into()), "test", entries)
                .unwrap(),
        )
    }

    #[test]
    fn returns_catalog_record_for_known_category() {
        let catalog = catalog();
        let resolver = HazardResolver::new(FixedClassifier::category(1), catalog.clone());
        let resolution = resolver.resolve("the gripper dropped a part").unwrap();
        assert_eq!(
            resolution.record.title,
            "Crane's vacuum gripper tool failure"
        );
        assert!(std::ptr::eq(
            resolution.record,
            catalog.get(HazardCategory(1)).unwrap()
        ));
        assert_eq!(
            resolution.outcome,
            Outcome::Matched {
                category: HazardCategory(1),
                confidence: None
            }
        );
    }

    #[test]
    fn out_of_range_category_falls_back() {
        let resolver = HazardResolver::new(FixedClassifier::category(99), catalog());
        let resolution = resolver.resolve("something odd").unwrap();
        assert!(resolution.record.is_undefined());
        assert_eq!(resolution.record.title, UNDEFINED_MITIGATION_TITLE);
        assert_eq!(
            resolution.outcome,
            Outcome::Fallback(FallbackReason::CategoryUndefined {
                category: HazardCategory(99)
            })
        );
    }

    #[test]
    fn classifier_failure_falls_back() {
        let resolver = HazardResolver::new(FixedClassifier::failing("model crashed"), catalog());
        let resolution = resolver.resolve("the gripper dropped a part").unwrap();
        assert!(resolution.record.is_undefined());
        assert!(resolution.is_fallback());
        assert_eq!(
            resolution.outcome,
            Outcome::Fallback(FallbackReason::ClassificationFailed)
        );
    }

    /// Rejects text with no alphanumeric characters as empty.
    struct StrictClassifier;

    impl Classifier for StrictClassifier {
        fn classify(&self, text: &str) -> Result<Classification, ClassificationError> {
            if !text.chars().any(char::is_alphanumeric) {
                return Err(ClassificationError::EmptyInput);
            }
            Ok(Classification::new(HazardCategory(0)))
        }

        fn name(&self) -> &str {
            "strict"
        }
    }

    #[test]
    fn classifier_empty_input_on_non_blank_text_falls_back() {
        let resolver = HazardResolver::new(Arc::new(StrictClassifier), catalog());
        let resolution = resolver.resolve("!!!").unwrap();
        assert!(resolution.record.is_undefined());
        assert_eq!(
            resolution.outcome,
            Outcome::Fallback(FallbackReason::ClassificationFailed)
        );
        assert_eq!(resolver.resolve("   ").unwrap_err(), ResolveError::EmptyInput);
    }

    #[test]
    fn empty_input_is_rejected_without_classifying() {
        let classifier = FixedClassifier::category(1);
        let resolver = HazardResolver::new(classifier.clone(), catalog());
        assert_eq!(resolver.resolve("").unwrap_err(), ResolveError::EmptyInput);
        assert_eq!(
            resolver.resolve(" \t\n").unwrap_err(),
            ResolveError::EmptyInput
        );
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeated_resolution_is_identical() {
        let resolver = HazardResolver::new(FixedClassifier::category(3), catalog());
        let first = resolver.resolve("crane path blocked").unwrap();
        let second = resolver.resolve("crane path blocked").unwrap();
        assert_eq!(
            serde_json::to_vec(first.record).unwrap(),
            serde_json::to_vec(second.record).unwrap()
        );
    }

    #[test]
    fn every_category_round_trips_unmodified() {
        let catalog = catalog();
        for category in catalog.categories() {
            let resolver = HazardResolver::new(FixedClassifier::category(category.0), catalog.clone());
            let resolution = resolver.resolve("anything").unwrap();
            assert_eq!(resolution.record, catalog.get(category).unwrap());
            assert!(!resolution.is_fallback());
        }
    }

    #[test]
    fn resolver_is_shareable_across_threads() {
        let resolver = HazardResolver::new(FixedClassifier::category(4), catalog());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve("smoke").unwrap().record.title.clone())
            })
            .collect();
        for handle in handles {
            assert_eq!(
                handle.join().unwrap(),
                "Install fire alarms and have fire extinguishers accessible"
            );
        }
    }
}
