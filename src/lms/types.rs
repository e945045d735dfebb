use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type AssignmentId = u64;
pub type UserId = u64;

/// Workflow state a submission must be in to count toward any statistic.
pub const GRADED: &str = "graded";

/// Identifier of an accreditation outcome.
///
/// The remote API reports outcome ids as integers on rubric criteria but has
/// been seen to send them as strings inside rubric assessments, so both forms
/// are accepted and normalized to their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OutcomeId(String);

impl OutcomeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutcomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for OutcomeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for OutcomeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for OutcomeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => OutcomeId(n.to_string()),
            RawId::Text(s) => OutcomeId(s.trim().to_string()),
        })
    }
}

/// One scored row of a grading rubric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub outcome_id: Option<OutcomeId>,
    #[serde(default)]
    pub points: Option<f64>,
}

impl Criterion {
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn long_description(&self) -> &str {
        self.long_description.as_deref().unwrap_or("")
    }

    /// Points possible, when defined and usable as a denominator.
    pub fn points_possible(&self) -> Option<f64> {
        self.points.filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Snapshot of an assignment, fetched once per run with its rubric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rubric: Option<Vec<Criterion>>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub course_id: Option<u64>,
}

impl Assignment {
    /// Rubric criteria in order; empty when the assignment has no rubric.
    pub fn criteria(&self) -> &[Criterion] {
        self.rubric.as_deref().unwrap_or(&[])
    }

    /// Non-blank description text.
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.trim().is_empty())
    }

    /// First rubric criterion linked to `outcome`.
    pub fn criterion_for(&self, outcome: &OutcomeId) -> Option<&Criterion> {
        self.criteria()
            .iter()
            .find(|c| c.outcome_id.as_ref() == Some(outcome))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub login_id: Option<String>,
    #[serde(default)]
    pub sis_user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Attachment {
    /// File extension including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        match self.filename.rfind('.') {
            Some(idx) if idx > 0 => &self.filename[idx..],
            _ => "",
        }
    }
}

/// Points and comments a grader entered for one rubric criterion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CriterionScore {
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default)]
    pub comments: Option<String>,
}

/// One entry of a detailed rubric assessment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub learning_outcome_id: Option<OutcomeId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub data: Vec<AssessmentEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub rubric_assessment: Option<BTreeMap<String, CriterionScore>>,
    #[serde(default)]
    pub full_rubric_assessment: Option<Assessment>,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.workflow_state.as_deref() == Some(GRADED)
    }

    /// Score of a graded submission; `None` for anything not counted.
    pub fn graded_score(&self) -> Option<f64> {
        if self.is_graded() {
            self.score.filter(|s| s.is_finite())
        } else {
            None
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or(&[])
    }

    /// Id of the owning user, from the embedded user record when present.
    pub fn owner_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id).or(self.user_id)
    }

    /// Roster login identifier of the owning user.
    pub fn login_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.login_id.as_deref())
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    /// Graded sub-score for `outcome` from the detailed rubric assessment.
    ///
    /// Only the first entry linked to the outcome is considered.
    pub fn outcome_points(&self, outcome: &OutcomeId) -> Option<f64> {
        self.full_rubric_assessment
            .as_ref()?
            .data
            .iter()
            .find(|entry| entry.learning_outcome_id.as_ref() == Some(outcome))?
            .points
            .filter(|p| p.is_finite())
    }
}

/// Course record. `raw` keeps the full remote payload, which is carried
/// into outcome reports untouched.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: u64,
    pub name: String,
    pub course_code: String,
    pub term_name: Option<String>,
    pub syllabus_body: Option<String>,
    pub raw: serde_json::Value,
}

impl Course {
    pub fn from_value(raw: serde_json::Value) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        struct Term {
            #[serde(default)]
            name: Option<String>,
        }

        #[derive(Deserialize)]
        struct Fields {
            id: u64,
            #[serde(default)]
            name: Option<String>,
            #[serde(default)]
            course_code: Option<String>,
            #[serde(default)]
            term: Option<Term>,
            #[serde(default)]
            syllabus_body: Option<String>,
        }

        let fields = Fields::deserialize(&raw)?;
        Ok(Course {
            id: fields.id,
            name: fields.name.unwrap_or_default(),
            course_code: fields.course_code.unwrap_or_else(|| "course".to_string()),
            term_name: fields.term.and_then(|t| t.name),
            syllabus_body: fields.syllabus_body.filter(|b| !b.trim().is_empty()),
            raw,
        })
    }
}

/// Metadata for a file stored in the remote course.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileInfo {
    pub id: u64,
    pub filename: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub folder_id: Option<u64>,
    pub url: String,
}

impl FileInfo {
    /// Name shown to people: the display name when set, the stored name otherwise.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.filename)
    }
}

/// A folder of the course Files area. `full_name` is the slash-separated
/// path from the course root, e.g. `course files/f25_CSE_310/Syllabus`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Folder {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Module {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A course wiki page. `url` is the page slug used to link it from modules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_id_accepts_number_and_string() {
        let a: OutcomeId = serde_json::from_value(json!(4021)).unwrap();
        let b: OutcomeId = serde_json::from_value(json!("4021")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "4021");
    }

    #[test]
    fn test_assignment_with_null_rubric() {
        let a: Assignment = serde_json::from_value(json!({
            "id": 7,
            "name": "Lab 1",
            "rubric": null,
            "description": "   "
        }))
        .unwrap();

        assert!(a.criteria().is_empty());
        assert!(a.description_text().is_none());
    }

    #[test]
    fn test_points_possible_rejects_zero() {
        let c = Criterion {
            points: Some(0.0),
            ..Default::default()
        };
        assert_eq!(c.points_possible(), None);

        let c = Criterion {
            points: Some(4.0),
            ..Default::default()
        };
        assert_eq!(c.points_possible(), Some(4.0));
    }

    #[test]
    fn test_graded_score_requires_graded_state() {
        let s = Submission {
            id: 1,
            score: Some(9.0),
            workflow_state: Some("submitted".to_string()),
            ..Default::default()
        };
        assert_eq!(s.graded_score(), None);

        let s = Submission {
            workflow_state: Some(GRADED.to_string()),
            ..s
        };
        assert_eq!(s.graded_score(), Some(9.0));
    }

    #[test]
    fn test_outcome_points_takes_first_match() {
        let s: Submission = serde_json::from_value(json!({
            "id": 1,
            "workflow_state": "graded",
            "full_rubric_assessment": {
                "data": [
                    {"id": "_1", "points": 2.0, "learning_outcome_id": null},
                    {"id": "_2", "points": 3.0, "learning_outcome_id": "55"},
                    {"id": "_3", "points": 1.0, "learning_outcome_id": 55}
                ]
            }
        }))
        .unwrap();

        assert_eq!(s.outcome_points(&OutcomeId::from(55)), Some(3.0));
        assert_eq!(s.outcome_points(&OutcomeId::from(56)), None);
    }

    #[test]
    fn test_login_id_ignores_blank() {
        let s = Submission {
            id: 1,
            user: Some(User {
                id: 3,
                login_id: Some("  ".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(s.login_id(), None);
        assert_eq!(s.owner_id(), Some(3));
    }

    #[test]
    fn test_course_from_value_keeps_raw() {
        let raw = json!({
            "id": 240102,
            "name": "Intro to Programming",
            "course_code": "CSE100",
            "term": {"name": "Fall 2025"},
            "syllabus_body": ""
        });
        let course = Course::from_value(raw.clone()).unwrap();

        assert_eq!(course.course_code, "CSE100");
        assert_eq!(course.term_name.as_deref(), Some("Fall 2025"));
        assert!(course.syllabus_body.is_none());
        assert_eq!(course.raw, raw);
    }

    #[test]
    fn test_attachment_extension() {
        let a = Attachment {
            filename: "report.final.pdf".to_string(),
            ..Default::default()
        };
        assert_eq!(a.extension(), ".pdf");

        let a = Attachment {
            filename: "README".to_string(),
            ..Default::default()
        };
        assert_eq!(a.extension(), "");
    }
}
