//! Nearest-example classifier over bag-of-words term counts.
//!
//! Every labeled example is reduced to lower-cased alphabetic terms (short
//! tokens and filler words dropped). Input is scored against each example by
//! cosine similarity; the best example's category wins, first example on
//! ties. Input longer than [`MAX_INPUT_TOKENS`] terms is truncated.

use crate::catalog::HazardCategory;
use crate::classifier::{Classification, ClassificationError, Classifier};
use crate::training::TrainingSet;
use std::collections::BTreeMap;

/// Matches the truncation length used when the examples were tokenized for
/// fine-tuning.
pub const MAX_INPUT_TOKENS: usize = 200;

const STOPWORDS: &[&str] = &[
    "an", "and", "at", "by", "during", "for", "from", "in", "into", "is", "it", "of", "on", "or",
    "the", "to", "was", "were", "with",
];

struct ExampleProfile {
    terms: BTreeMap<String, f32>,
    norm: f32,
    category: HazardCategory,
}

pub struct ExampleClassifier {
    profiles: Vec<ExampleProfile>,
    declared: Vec<HazardCategory>,
}

impl ExampleClassifier {
    pub fn new(training: &TrainingSet) -> Self {
        let profiles = training
            .examples()
            .filter_map(|(example, category)| {
                let terms = term_counts(&example.prompt);
                let norm = norm(&terms);
                if norm == 0.0 {
                    log::warn!(
                        "labeled example '{}' has no usable terms; skipping",
                        example.prompt
                    );
                    return None;
                }
                Some(ExampleProfile {
                    terms,
                    norm,
                    category,
                })
            })
            .collect();
        Self {
            profiles,
            declared: training.declared_categories().into_iter().collect(),
        }
    }

    fn score(&self, query: &BTreeMap<String, f32>) -> Option<(f32, HazardCategory)> {
        let query_norm = norm(query);
        if query_norm == 0.0 {
            return None;
        }
        let mut best: Option<(f32, HazardCategory)> = None;
        for profile in &self.profiles {
            let dot: f32 = query
                .iter()
                .filter_map(|(term, count)| profile.terms.get(term).map(|other| count * other))
                .sum();
            if dot == 0.0 {
                continue;
            }
            let score = dot / (query_norm * profile.norm);
            if best.is_none_or(|(current, _)| score > current) {
                best = Some((score, profile.category));
            }
        }
        best
    }
}

impl Classifier for ExampleClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }
        let query = term_counts(text);
        if query.is_empty() {
            return Err(ClassificationError::InferenceFailed(
                "input contains no recognizable terms".to_string(),
            ));
        }
        match self.score(&query) {
            Some((score, category)) => Ok(Classification::with_confidence(category, score)),
            None => Err(ClassificationError::InferenceFailed(
                "no labeled example shares a term with the input".to_string(),
            )),
        }
    }

    fn declared_categories(&self) -> Vec<HazardCategory> {
        self.declared.clone()
    }

    fn name(&self) -> &str {
        "examples"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|token| token.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .take(MAX_INPUT_TOKENS)
}

fn term_counts(text: &str) -> BTreeMap<String, f32> {
    let mut counts = BTreeMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

fn norm(terms: &BTreeMap<String, f32>) -> f32 {
    terms.values().map(|count| count * count).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LabeledExample, default_label_mapping};

    fn classifier() -> ExampleClassifier {
        let examples = [
            ("Process2 Failure", "PROCESS"),
            ("Process1 Failure", "PROCESS"),
            ("Crane's vacuum gripper tool failure", "TOOL_FAILURE"),
            ("Colloison during placing part on running process", "COLLISION"),
            (
                "Miscommunication, Overloading, and Crane Path Obstruction",
                "OPERATIONAL_ERROR",
            ),
        ]
        .map(|(prompt, label)| LabeledExample {
            prompt: prompt.to_string(),
            label: label.to_string(),
        });
        ExampleClassifier::new(&TrainingSet::new(default_label_mapping(), examples).unwrap())
    }

    #[test]
    fn tokenizer_drops_digits_short_tokens_and_filler() {
        let tokens: Vec<_> = tokenize("Process2 failure on the Crane's path").collect();
        assert_eq!(tokens, vec!["process", "failure", "crane", "path"]);
    }

    #[test]
    fn tokenizer_truncates_long_input() {
        let long = "gripper ".repeat(MAX_INPUT_TOKENS * 2);
        assert_eq!(tokenize(&long).count(), MAX_INPUT_TOKENS);
    }

    #[test]
    fn classifies_against_nearest_example() {
        let classifier = classifier();
        let result = classifier
            .classify("vacuum gripper dropped the part")
            .unwrap();
        assert_eq!(result.category, HazardCategory(1));
        assert!(result.confidence.unwrap() > 0.0);

        let result = classifier.classify("process failure in line 3").unwrap();
        assert_eq!(result.category, HazardCategory(0));

        let result = classifier
            .classify("crane path obstruction after overloading")
            .unwrap();
        assert_eq!(result.category, HazardCategory(3));
    }

    #[test]
    fn exact_example_scores_full_confidence() {
        let result = classifier()
            .classify("Miscommunication, Overloading, and Crane Path Obstruction")
            .unwrap();
        assert_eq!(result.category, HazardCategory(3));
        assert!((result.confidence.unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn unrelated_input_fails_inference() {
        let err = classifier().classify("coffee machine is empty").unwrap_err();
        assert!(matches!(err, ClassificationError::InferenceFailed(_)));
        let err = classifier().classify("!!! 123").unwrap_err();
        assert!(matches!(err, ClassificationError::InferenceFailed(_)));
        assert!(matches!(
            classifier().classify("   "),
            Err(ClassificationError::EmptyInput)
        ));
    }

    #[test]
    fn declares_label_mapping_range() {
        let declared = classifier().declared_categories();
        assert_eq!(declared, [0, 1, 2, 3].map(HazardCategory).to_vec());
    }
}
