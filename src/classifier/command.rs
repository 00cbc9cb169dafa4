//! Classifier backed by an external model process.
//!
//! The program receives the input text on stdin and must print either a bare
//! integer category or a JSON object `{"category": n, "confidence": f}` on
//! stdout. Negative categories are the model's "could not classify" sentinel.
//! Each call is bounded by a timeout; the child is killed when it expires.

use crate::catalog::HazardCategory;
use crate::classifier::{Classification, ClassificationError, Classifier};
use serde_json::Value;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    declared: Vec<HazardCategory>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_TIMEOUT,
            declared: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record the categories the external model was trained to emit.
    pub fn with_declared_categories(
        mut self,
        declared: impl IntoIterator<Item = HazardCategory>,
    ) -> Self {
        self.declared = declared.into_iter().collect();
        self
    }

    fn run(&self, text: &str) -> Result<String, ClassificationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                ClassificationError::InferenceFailed(format!(
                    "failed to start {}: {err}",
                    self.program.display()
                ))
            })?;

        let deadline = Instant::now() + self.timeout;
        let stdin = child.stdin.take();
        let input = text.to_string();
        thread::spawn(move || {
            if let Some(mut stdin) = stdin {
                // A model that exits without reading stdin is judged by its
                // output, not by the broken pipe.
                let _ = stdin.write_all(input.as_bytes());
            }
        });
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let Some(status) = wait_until(&mut child, deadline)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ClassificationError::TimedOut(self.timeout));
        };
        // Descendants of the model can keep the pipes open after it exits;
        // the output must still arrive before the deadline.
        let stdout = recv_until(&stdout, deadline)
            .ok_or(ClassificationError::TimedOut(self.timeout))?;
        let stderr = recv_until(&stderr, deadline).unwrap_or_default();

        if !status.success() {
            return Err(ClassificationError::InferenceFailed(format!(
                "{} exited with {status}: {}",
                self.program.display(),
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassificationError> {
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }
        let started = Instant::now();
        let output = self.run(text)?;
        let classification = parse_classifier_output(&output)?;
        log::debug!(
            "{} classified input as {} in {:?}",
            self.program.display(),
            classification.category,
            started.elapsed()
        );
        Ok(classification)
    }

    fn declared_categories(&self) -> Vec<HazardCategory> {
        self.declared.clone()
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Interpret stdout of the model process.
pub fn parse_classifier_output(raw: &str) -> Result<Classification, ClassificationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassificationError::InvalidOutput(
            "empty output".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| ClassificationError::InvalidOutput(format!("{trimmed}: {err}")))?;
    let (category, confidence) = match &value {
        Value::Number(_) => (&value, None),
        Value::Object(map) => {
            let category = map.get("category").ok_or_else(|| {
                ClassificationError::InvalidOutput("object missing 'category'".to_string())
            })?;
            let confidence = match map.get("confidence") {
                None | Some(Value::Null) => None,
                Some(raw) => Some(raw.as_f64().ok_or_else(|| {
                    ClassificationError::InvalidOutput("confidence is not a number".to_string())
                })?),
            };
            (category, confidence)
        }
        _ => {
            return Err(ClassificationError::InvalidOutput(format!(
                "expected integer or object, got {trimmed}"
            )));
        }
    };

    let Some(id) = category.as_i64() else {
        return Err(ClassificationError::InvalidOutput(format!(
            "category is not an integer: {category}"
        )));
    };
    if id < 0 {
        return Err(ClassificationError::InferenceFailed(format!(
            "model reported invalid class {id}"
        )));
    }
    let id = u32::try_from(id)
        .map_err(|_| ClassificationError::InvalidOutput(format!("category {id} out of range")))?;

    Ok(match confidence {
        Some(confidence) => Classification::with_confidence(HazardCategory(id), confidence as f32),
        None => Classification::new(HazardCategory(id)),
    })
}

fn wait_until(
    child: &mut Child,
    deadline: Instant,
) -> Result<Option<std::process::ExitStatus>, ClassificationError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn recv_until(rx: &Receiver<String>, deadline: Instant) -> Option<String> {
    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
        .ok()
}
