//! Display text for mitigation records.
//!
//! The layout reproduces the advisory strings operators already know:
//!
//! ```text
//! <title>
//!    -> Risk to Operators:
//!        - <risk>
//!    Mitigations:
//!    <actions joined by a space>
//! ```
//!
//! A record with no risks and no actions renders as its bare title.

use crate::catalog::MitigationRecord;
use std::fmt::{self, Write};

pub fn render_record(record: &MitigationRecord) -> String {
    let mut out = String::new();
    write_record(record, &mut out).expect("write to string");
    out
}

pub fn write_record(record: &MitigationRecord, writer: &mut impl Write) -> fmt::Result {
    if record.risks.is_empty() && record.actions.is_empty() {
        return write!(writer, "{}", record.title);
    }
    write!(writer, "{} ", record.title)?;
    if !record.risks.is_empty() {
        write!(writer, "\n   -> Risk to Operators:")?;
        for risk in &record.risks {
            write!(writer, "\n       - {risk}")?;
        }
    }
    if !record.actions.is_empty() {
        write!(writer, "\n   Mitigations:\n   {}", record.actions.join(" "))?;
    }
    Ok(())
}
