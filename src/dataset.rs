//! Hazard/mitigation annotation dataset.
//!
//! The dataset is a JSON array of `{"hazard", "mitigation"}` objects. Older
//! files may hold bare hazard strings; those are upgraded to entries with an
//! empty mitigation when loaded. [`AnnotationSession`] drives the interactive
//! menu used to fill in missing mitigations.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct HazardEntry {
    pub hazard: String,
    /// `null` and a missing key both read as "not provided".
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mitigation: String,
    /// Keys this tool does not edit; written back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl HazardEntry {
    pub fn new(hazard: impl Into<String>) -> Self {
        Self {
            hazard: hazard.into(),
            ..Self::default()
        }
    }

    pub fn has_mitigation(&self) -> bool {
        !self.mitigation.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DatasetStats {
    pub total: usize,
    pub with_mitigation: usize,
    pub without_mitigation: usize,
}

/// Load the dataset; a missing file is an empty dataset.
pub fn load_dataset(path: &Path) -> Result<Vec<HazardEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let items: Vec<Value> = serde_json::from_str(&data)
        .with_context(|| format!("{} must contain a JSON array", path.display()))?;
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::String(hazard) => Ok(HazardEntry::new(hazard)),
            Value::Object(_) => serde_json::from_value(item)
                .with_context(|| format!("entry {} in {}", idx + 1, path.display())),
            other => bail!(
                "entry {} in {} must be a string or object, got {other}",
                idx + 1,
                path.display()
            ),
        })
        .collect()
}

/// Write the dataset as 4-space indented JSON, replacing the file atomically.
pub fn save_dataset(path: &Path, entries: &[HazardEntry]) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    {
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut tmp, formatter);
        entries
            .serialize(&mut serializer)
            .context("serializing dataset")?;
    }
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn dataset_stats(entries: &[HazardEntry]) -> DatasetStats {
    let with_mitigation = entries.iter().filter(|entry| entry.has_mitigation()).count();
    DatasetStats {
        total: entries.len(),
        with_mitigation,
        without_mitigation: entries.len() - with_mitigation,
    }
}

pub fn write_dataset(entries: &[HazardEntry], out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\nCurrent Dataset:")?;
    for (idx, entry) in entries.iter().enumerate() {
        writeln!(out, "{}. Hazard: {}", idx + 1, entry.hazard)?;
        if entry.has_mitigation() {
            writeln!(out, "   Mitigation: {}", entry.mitigation)?;
        } else {
            writeln!(out, "   Mitigation: Not provided")?;
        }
    }
    Ok(())
}

pub fn write_stats(stats: &DatasetStats, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\nDataset Statistics:")?;
    writeln!(out, "Total Hazards: {}", stats.total)?;
    writeln!(out, "Hazards with Mitigation: {}", stats.with_mitigation)?;
    writeln!(out, "Hazards without Mitigation: {}", stats.without_mitigation)?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionEnd {
    /// The user chose "Save and exit".
    Saved,
    /// Input ended before the user saved.
    InputClosed,
}

/// Menu-driven annotation loop over arbitrary input/output streams.
pub struct AnnotationSession<R, W> {
    entries: Vec<HazardEntry>,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> AnnotationSession<R, W> {
    pub fn new(entries: Vec<HazardEntry>, input: R, output: W) -> Self {
        Self {
            entries,
            input,
            output,
        }
    }

    pub fn entries(&self) -> &[HazardEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<HazardEntry> {
        self.entries
    }

    /// Run the menu until the user saves or input runs out. Persisting the
    /// entries is left to the caller.
    pub fn run(&mut self) -> Result<SessionEnd> {
        writeln!(self.output, "Hazard Dataset Enrichment Tool")?;
        writeln!(self.output, "{}", "-".repeat(50))?;

        loop {
            writeln!(self.output, "\nOptions:")?;
            writeln!(self.output, "1. Display dataset")?;
            writeln!(self.output, "2. Add mitigations to hazards")?;
            writeln!(self.output, "3. Display dataset statistics")?;
            writeln!(self.output, "4. Save and exit")?;

            let Some(choice) = self.prompt("Enter your choice: ")? else {
                return Ok(SessionEnd::InputClosed);
            };
            match choice.as_str() {
                "1" => write_dataset(&self.entries, &mut self.output)?,
                "2" => {
                    if !self.add_mitigations()? {
                        return Ok(SessionEnd::InputClosed);
                    }
                }
                "3" => write_stats(&dataset_stats(&self.entries), &mut self.output)?,
                "4" => return Ok(SessionEnd::Saved),
                _ => writeln!(self.output, "Invalid choice. Please try again.")?,
            }
        }
    }

    /// Returns false when input closed mid-annotation.
    fn add_mitigations(&mut self) -> Result<bool> {
        writeln!(self.output, "\nAdding mitigations to hazards...")?;
        for idx in 0..self.entries.len() {
            if self.entries[idx].has_mitigation() {
                continue;
            }
            writeln!(self.output, "\nHazard: {}", self.entries[idx].hazard)?;
            let Some(mitigation) = self.prompt("Enter the mitigation for this hazard: ")? else {
                return Ok(false);
            };
            self.entries[idx].mitigation = mitigation;
            writeln!(self.output, "Mitigation added successfully!")?;
        }
        Ok(true)
    }

    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line).context("reading input")? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn entry(hazard: &str, mitigation: &str) -> HazardEntry {
        HazardEntry {
            mitigation: mitigation.to_string(),
            ..HazardEntry::new(hazard)
        }
    }

    #[test]
    fn missing_file_is_empty_dataset() {
        let dir = TempDir::new().unwrap();
        assert!(load_dataset(&dir.path().join("absent.json")).unwrap().is_empty());
    }

    #[test]
    fn bare_strings_are_upgraded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hazards.json");
        fs::write(
            &path,
            r#"["Robot collision", {"hazard": "Gripper failure", "mitigation": "Add sensors"}, {"hazard": "Smoke"}]"#,
        )
        .unwrap();
        let entries = load_dataset(&path).unwrap();
        assert_eq!(
            entries,
            vec![
                entry("Robot collision", ""),
                entry("Gripper failure", "Add sensors"),
                entry("Smoke", ""),
            ]
        );
    }

    #[test]
    fn null_mitigation_reads_as_not_provided() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hazards.json");
        fs::write(&path, r#"[{"hazard": "Smoke", "mitigation": null}]"#).unwrap();
        let entries = load_dataset(&path).unwrap();
        assert_eq!(entries, vec![entry("Smoke", "")]);
        assert!(!entries[0].has_mitigation());
    }

    #[test]
    fn unknown_keys_survive_a_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hazards.json");
        fs::write(
            &path,
            r#"[{"hazard": "Smoke", "mitigation": "", "severity": "high", "tags": ["fire"]}]"#,
        )
        .unwrap();
        let mut entries = load_dataset(&path).unwrap();
        assert_eq!(entries[0].extra["severity"], "high");
        entries[0].mitigation = "Install alarms".into();
        save_dataset(&path, &entries).unwrap();

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            saved,
            serde_json::json!([{
                "hazard": "Smoke",
                "mitigation": "Install alarms",
                "severity": "high",
                "tags": ["fire"]
            }])
        );
    }

    #[test]
    fn non_array_or_bad_entries_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hazards.json");
        fs::write(&path, r#"{"hazard": "x"}"#).unwrap();
        assert!(load_dataset(&path).is_err());
        fs::write(&path, "[1]").unwrap();
        assert!(load_dataset(&path).is_err());
    }

    #[test]
    fn save_uses_four_space_indent_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hazards.json");
        let entries = vec![entry("Smoke", "Install alarms")];
        save_dataset(&path, &entries).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    {\n        \"hazard\": \"Smoke\""));
        assert_eq!(load_dataset(&path).unwrap(), entries);
    }

    #[test]
    fn stats_count_filled_entries() {
        let stats = dataset_stats(&[entry("a", "x"), entry("b", ""), entry("c", "")]);
        assert_eq!(
            stats,
            DatasetStats {
                total: 3,
                with_mitigation: 1,
                without_mitigation: 2
            }
        );
    }

    #[test]
    fn session_annotates_missing_entries_and_saves() {
        let input = Cursor::new("2\nAdd barriers\n  Train operators  \n3\n1\n9\n4\n");
        let mut output = Vec::new();
        let mut session = AnnotationSession::new(
            vec![entry("Collision", ""), entry("Fire", "Alarms"), entry("Drop", "")],
            input,
            &mut output,
        );
        assert_eq!(session.run().unwrap(), SessionEnd::Saved);
        assert_eq!(
            session.entries(),
            &[
                entry("Collision", "Add barriers"),
                entry("Fire", "Alarms"),
                entry("Drop", "Train operators"),
            ]
        );
        drop(session);

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Hazard: Collision"));
        assert!(!text.contains("\nHazard: Fire\n"));
        assert!(text.contains("Hazards with Mitigation: 3"));
        assert!(text.contains("3. Hazard: Drop\n   Mitigation: Train operators"));
        assert!(text.contains("Invalid choice. Please try again."));
    }

    #[test]
    fn session_stops_when_input_closes() {
        let mut session =
            AnnotationSession::new(vec![entry("Collision", "")], Cursor::new("2\n"), io::sink());
        assert_eq!(session.run().unwrap(), SessionEnd::InputClosed);
        assert_eq!(session.into_entries(), vec![entry("Collision", "")]);
    }
}
