//! Report emission and artifact naming.
//!
//! Writes outcome reports as JSON and per-assignment grade reports as CSV
//! into the staging directory, and derives the file and folder names used
//! when they are published.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::analyzers::types::OutcomeReport;
use crate::lms::{Course, OutcomeId, Submission};

static INVALID_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("filename pattern is valid"));

static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s+([0-9]{4})").expect("term pattern is valid"));

static OUTCOME_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(CS|CSE)\s*ABET\s*\d+").expect("outcome code pattern is valid"));

/// Header of the per-assignment grade report.
pub const GRADE_REPORT_HEADER: [&str; 5] =
    ["user_id", "user_name", "score", "submitted_at", "workflow_state"];

/// Replaces spaces and characters invalid in Windows or Linux filenames with `_`.
pub fn sanitize_filename(name: &str) -> String {
    INVALID_FILENAME_CHARS
        .replace_all(&name.replace(' ', "_"), "_")
        .into_owned()
}

/// Converts a term name such as `Fall 2025` to `f25`; `term` when unparsable.
pub fn semester_short_code(term_name: Option<&str>) -> String {
    term_name
        .and_then(|name| TERM_RE.captures(name))
        .and_then(|caps| {
            let season = caps.get(1)?.as_str().chars().next()?.to_lowercase();
            let year = caps.get(2)?.as_str();
            Some(format!("{}{}", season, &year[year.len() - 2..]))
        })
        .unwrap_or_else(|| "term".to_string())
}

/// Top-level folder a course's artifacts are published under, e.g. `f25_CSE_310`.
pub fn course_root_folder(course: &Course) -> String {
    format!(
        "{}_{}",
        semester_short_code(course.term_name.as_deref()),
        sanitize_filename(&course.course_code)
    )
}

/// Name for a representative submission file, e.g. `cse100-f25-lab_1-high.pdf`.
pub fn representative_filename(
    course_code: &str,
    semester: &str,
    assignment_name: &str,
    label: &str,
    extension: &str,
) -> String {
    let course = sanitize_filename(course_code).replace('_', "").to_lowercase();
    format!(
        "{}-{}-{}-{}{}",
        course,
        semester,
        sanitize_filename(assignment_name),
        label,
        extension
    )
}

/// Name of an outcome report file, keyed by the outcome code in its title
/// when there is one.
pub fn report_filename(title: &str) -> String {
    let name = match OUTCOME_CODE_RE.find(title) {
        Some(m) => m.as_str().replace(' ', "_"),
        None => sanitize_filename(title),
    };
    format!("OUTCOME_{name}.json")
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("writing JSON to {}", path.display()))?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Report filenames handed out during one run.
///
/// Two outcomes whose titles carry the same outcome code would otherwise map
/// to the same file; the later one is disambiguated by its outcome id.
#[derive(Debug, Default)]
pub struct ReportNames {
    taken: HashSet<String>,
}

impl ReportNames {
    pub fn claim(&mut self, title: &str, outcome: &OutcomeId) -> String {
        let base = report_filename(title);
        if self.taken.insert(base.clone()) {
            return base;
        }

        let stem = base.trim_end_matches(".json");
        let id = sanitize_filename(outcome.as_str());
        let mut name = format!("{stem}_{id}.json");
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{stem}_{id}_{n}.json");
            n += 1;
        }
        name
    }
}

/// Writes an outcome report into `dir` as `filename` and returns its path.
pub fn write_report(dir: &Path, filename: &str, report: &OutcomeReport) -> Result<PathBuf> {
    let path = dir.join(filename);
    write_json(&path, report)?;
    info!(
        path = %path.display(),
        sample_size = report.results.overall_summary.sample_size,
        "Outcome report written"
    );
    Ok(path)
}

/// Reads an outcome report back from JSON.
pub fn read_report(path: &Path) -> Result<OutcomeReport> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(serde_json::from_reader(file)?)
}

#[derive(Debug, Serialize)]
struct GradeRow<'a> {
    user_id: String,
    user_name: &'a str,
    score: Option<f64>,
    submitted_at: String,
    workflow_state: &'a str,
}

impl<'a> GradeRow<'a> {
    fn from_submission(s: &'a Submission) -> Self {
        let user = s.user.as_ref();
        GradeRow {
            user_id: s
                .owner_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            user_name: user.and_then(|u| u.name.as_deref()).unwrap_or("N/A"),
            score: s.score,
            submitted_at: s
                .submitted_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "N/A".to_string()),
            workflow_state: s.workflow_state.as_deref().unwrap_or("N/A"),
        }
    }
}

/// Writes one row per submission, in the order given, under
/// [`GRADE_REPORT_HEADER`].
pub fn write_grade_report(path: &Path, submissions: &[Submission]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    for submission in submissions {
        writer.serialize(GradeRow::from_submission(submission))?;
    }
    if submissions.is_empty() {
        writer.write_record(GRADE_REPORT_HEADER)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = submissions.len(), "Grade report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{
        CompetencySummary, ContributingAssignment, OutcomeMeta, OutcomeResults,
    };
    use crate::lms::{User, GRADED};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Lab 1: Sorting?"), "Lab_1__Sorting_");
        assert_eq!(sanitize_filename(r#"a<b>c"d/e\f|g*h"#), "a_b_c_d_e_f_g_h");
    }

    #[test]
    fn test_semester_short_code() {
        assert_eq!(semester_short_code(Some("Fall 2025")), "f25");
        assert_eq!(semester_short_code(Some("Spring 2024 Session A")), "s24");
        assert_eq!(semester_short_code(Some("Default Term")), "term");
        assert_eq!(semester_short_code(None), "term");
    }

    #[test]
    fn test_semester_short_code_ignores_non_ascii_digits() {
        assert_eq!(semester_short_code(Some("Fall 20２５")), "term");
        assert_eq!(semester_short_code(Some("Fall ２０２５ / Spring 2026")), "s26");
    }

    #[test]
    fn test_course_root_folder() {
        let course = Course::from_value(serde_json::json!({
            "id": 1,
            "course_code": "CSE 310",
            "term": {"name": "Fall 2025"}
        }))
        .unwrap();
        assert_eq!(course_root_folder(&course), "f25_CSE_310");
    }

    #[test]
    fn test_representative_filename() {
        assert_eq!(
            representative_filename("CSE 100", "f20", "Lab 1", "high", ".pdf"),
            "cse100-f20-Lab_1-high.pdf"
        );
    }

    #[test]
    fn test_report_filename() {
        assert_eq!(
            report_filename("CS ABET 1 - Analyze a complex computing problem"),
            "OUTCOME_CS_ABET_1.json"
        );
        assert_eq!(report_filename("cseabet2"), "OUTCOME_cseabet2.json");
        assert_eq!(report_filename("Teamwork: roles"), "OUTCOME_Teamwork__roles.json");
    }

    #[test]
    fn test_report_names_unique_per_outcome() {
        let mut names = ReportNames::default();

        assert_eq!(
            names.claim("CS ABET 1 analyze", &OutcomeId::from(11)),
            "OUTCOME_CS_ABET_1.json"
        );
        assert_eq!(
            names.claim("CS ABET 1 analyze (program 2)", &OutcomeId::from(22)),
            "OUTCOME_CS_ABET_1_22.json"
        );
        assert_eq!(
            names.claim("CS ABET 1 again", &OutcomeId::from(22)),
            "OUTCOME_CS_ABET_1_22_2.json"
        );
        assert_eq!(names.claim("CS ABET 2", &OutcomeId::from(33)), "OUTCOME_CS_ABET_2.json");
    }

    #[test]
    fn test_report_round_trip_keeps_summary() {
        let dir = temp_dir("abet_artifacts_test_report");
        let summary = CompetencySummary::from_counts(3, 2);
        let report = OutcomeReport {
            outcome_identification: OutcomeMeta {
                title: "CS ABET 6".to_string(),
                description: "<p>CS ABET 6</p>".to_string(),
                long_description: "Apply theory".to_string(),
            },
            course_identification: serde_json::json!({"id": 1, "course_code": "CSE340"}),
            results: OutcomeResults {
                overall_summary: summary,
                distribution_by_major: BTreeMap::from([("CS/CSE".to_string(), summary)]),
            },
            contributing_assignments: vec![ContributingAssignment {
                id: 5,
                name: "Project".to_string(),
                description: None,
                description_files_content: BTreeMap::new(),
            }],
        };

        let path = write_report(&dir, "OUTCOME_CS_ABET_6.json", &report).unwrap();
        assert_eq!(path.file_name().unwrap(), "OUTCOME_CS_ABET_6.json");

        let parsed = read_report(&path).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.results.overall_summary.percent_competent, 66.67);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["results"]["overall_summary"]["sample_size"], 3);
        assert_eq!(raw["results"]["distribution_by_major"]["CS/CSE"]["outcome_met"], false);
        assert_eq!(raw["outcome_identification"]["long_description"], "Apply theory");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_grade_report_rows_in_fetch_order() {
        let dir = temp_dir("abet_artifacts_test_grades");
        let path = dir.join("grade_report_9.csv");
        let submissions = vec![
            Submission {
                id: 1,
                user: Some(User {
                    id: 42,
                    name: Some("Ada Lovelace".to_string()),
                    ..Default::default()
                }),
                score: Some(9.5),
                workflow_state: Some(GRADED.to_string()),
                submitted_at: Some(Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()),
                ..Default::default()
            },
            Submission {
                id: 2,
                user_id: Some(43),
                workflow_state: Some("unsubmitted".to_string()),
                ..Default::default()
            },
        ];

        write_grade_report(&path, &submissions).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();

        assert_eq!(lines[0], "user_id,user_name,score,submitted_at,workflow_state");
        assert_eq!(lines[1], "42,Ada Lovelace,9.5,2025-09-01T12:00:00+00:00,graded");
        assert_eq!(lines[2], "43,N/A,,N/A,unsubmitted");
        assert_eq!(lines.len(), 3);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_grade_report_empty_has_header() {
        let dir = temp_dir("abet_artifacts_test_grades_empty");
        let path = dir.join("grade_report_1.csv");

        write_grade_report(&path, &[]).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert_eq!(content, "user_id,user_name,score,submitted_at,workflow_state\n");
        fs::remove_dir_all(&dir).unwrap();
    }
}
