//! Data types used by the outcome pipeline.

use crate::analyzers::utility::{pct, round2};
use crate::lms::{AssignmentId, Course, Submission};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Minimum fraction of an outcome's points a submission needs to count as competent.
pub const COMPETENCY_RATIO: f64 = 0.70;

/// Minimum percent of competent submissions for an outcome to be met.
pub const OUTCOME_MET_PERCENT: f64 = 70.0;

/// Filename to extracted text, for documents linked from an assignment description.
pub type DescriptionTexts = BTreeMap<String, String>;

/// Human-readable identification of an outcome, taken from the first
/// rubric criterion that references it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMeta {
    pub title: String,
    pub description: String,
    pub long_description: String,
}

/// Competency statistics for one pool of submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetencySummary {
    pub sample_size: usize,
    pub number_competent: usize,
    pub percent_competent: f64,
    pub outcome_met: bool,
}

impl CompetencySummary {
    pub fn from_counts(sample_size: usize, number_competent: usize) -> Self {
        let percent = pct(number_competent, sample_size);
        Self {
            sample_size,
            number_competent,
            percent_competent: round2(percent),
            outcome_met: percent >= OUTCOME_MET_PERCENT,
        }
    }
}

/// Running count of pooled and competent submissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tally {
    total: usize,
    competent: usize,
}

impl Tally {
    pub fn add(&mut self, competent: bool) {
        self.total += 1;
        if competent {
            self.competent += 1;
        }
    }

    pub fn summary(&self) -> CompetencySummary {
        CompetencySummary::from_counts(self.total, self.competent)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeResults {
    pub overall_summary: CompetencySummary,
    pub distribution_by_major: BTreeMap<String, CompetencySummary>,
}

/// An assignment that contributed to an outcome report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributingAssignment {
    pub id: AssignmentId,
    pub name: String,
    pub description: Option<String>,
    pub description_files_content: DescriptionTexts,
}

/// Complete report for one outcome, published as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub outcome_identification: OutcomeMeta,
    pub course_identification: serde_json::Value,
    pub results: OutcomeResults,
    pub contributing_assignments: Vec<ContributingAssignment>,
}

/// A submission paired with its sub-score for one outcome and that
/// assignment's point scale for the outcome.
#[derive(Debug, Clone, Copy)]
pub struct ScoredSubmission<'a> {
    pub submission: &'a Submission,
    pub outcome_score: f64,
    pub outcome_points_possible: f64,
}

impl ScoredSubmission<'_> {
    pub fn ratio(&self) -> f64 {
        self.outcome_score / self.outcome_points_possible
    }

    pub fn is_competent(&self) -> bool {
        self.ratio() >= COMPETENCY_RATIO
    }
}

/// Everything fetched from the remote course once per run.
#[derive(Debug, Clone)]
pub struct CourseSnapshot {
    pub course: Course,
    pub submissions: HashMap<AssignmentId, Vec<Submission>>,
    pub description_texts: HashMap<AssignmentId, DescriptionTexts>,
}

impl CourseSnapshot {
    pub fn new(course: Course) -> Self {
        Self {
            course,
            submissions: HashMap::new(),
            description_texts: HashMap::new(),
        }
    }

    pub fn submissions_for(&self, assignment: AssignmentId) -> &[Submission] {
        self.submissions
            .get(&assignment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
