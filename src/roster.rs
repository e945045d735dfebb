//! Roster parsing and major classification.
//!
//! A roster extract is a CSV with one row per student. Students whose
//! plan-of-study text looks like computer science or computer systems
//! engineering are mapped from their login identifier to [`TARGET_MAJOR`];
//! every other student is simply absent from the map.

use crate::config::RosterColumns;
use crate::error::{RosterError, RosterResult};
use regex::Regex;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Label of the only major bucket the classifier produces.
pub const TARGET_MAJOR: &str = "CS/CSE";

static TARGET_MAJOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \bcomputer\s+science\b
        | \bcomputer\s+sci\b
        | \bcomputer\s+systems\s+eng
        | \bcse\b",
    )
    .expect("target major pattern is valid")
});

/// Login identifier to major label, built once per run.
pub type StudentMajorMap = HashMap<String, String>;

/// The two roster fields classification looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRow {
    pub login_id: Option<String>,
    pub plan: Option<String>,
}

impl RosterRow {
    pub fn new(login_id: &str, plan: &str) -> Self {
        Self {
            login_id: Some(login_id.to_string()),
            plan: Some(plan.to_string()),
        }
    }
}

/// Returns `true` if a plan-of-study text belongs to the target major.
pub fn is_target_major(plan: &str) -> bool {
    !plan.trim().is_empty() && TARGET_MAJOR_RE.is_match(plan)
}

/// Builds the login to major map. Total: rows that cannot be classified are
/// dropped, never reported.
pub fn classify(rows: &[RosterRow]) -> StudentMajorMap {
    let mut majors = StudentMajorMap::new();

    for row in rows {
        let plan = row.plan.as_deref().map(str::trim).unwrap_or("");
        if !is_target_major(plan) {
            continue;
        }

        match row.login_id.as_deref().map(str::trim) {
            Some(login) if !login.is_empty() => {
                majors.insert(login.to_string(), TARGET_MAJOR.to_string());
            }
            _ => debug!(plan, "Classified roster row has no login id, skipping"),
        }
    }

    majors
}

/// Reads roster rows from CSV, validating that both configured columns
/// exist in the header row.
pub fn read_roster<R: Read>(reader: R, columns: &RosterColumns) -> RosterResult<Vec<RosterRow>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let login_idx = column_index(&headers, &columns.login)?;
    let plan_idx = column_index(&headers, &columns.plan)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(RosterRow {
            login_id: record.get(login_idx).map(str::to_string),
            plan: record.get(plan_idx).map(str::to_string),
        });
    }

    Ok(rows)
}

/// Reads the roster file at `path` and classifies it.
pub fn load_major_map(path: &Path, columns: &RosterColumns) -> RosterResult<StudentMajorMap> {
    let file = std::fs::File::open(path)?;
    let rows = read_roster(file, columns)?;
    let majors = classify(&rows);

    info!(
        path = %path.display(),
        rows = rows.len(),
        classified = majors.len(),
        "Roster parsed"
    );

    Ok(majors)
}

/// Copies the header and every target-major row from `reader` to `writer`.
///
/// Returns the number of data rows written.
pub fn filter_roster<R: Read, W: Write>(
    reader: R,
    writer: W,
    columns: &RosterColumns,
) -> RosterResult<usize> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let plan_idx = column_index(&headers, &columns.plan)?;

    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    wtr.write_record(&headers)?;

    let mut written = 0;
    for record in rdr.records() {
        let record = record?;
        if is_target_major(record.get(plan_idx).unwrap_or("")) {
            wtr.write_record(&record)?;
            written += 1;
        }
    }
    wtr.flush()?;

    Ok(written)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> RosterResult<usize> {
    // Spreadsheet exports often start with a UTF-8 byte order mark.
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == name)
        .ok_or_else(|| RosterError::MissingColumn {
            column: name.to_string(),
            found: headers.iter().collect::<Vec<_>>().join(", "),
        })
}
