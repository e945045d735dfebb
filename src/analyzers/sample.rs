//! Selection of representative work samples for an assignment.

use crate::analyzers::utility::mean;
use crate::lms::Submission;

/// Highest-, average- and lowest-scoring graded submissions of one assignment.
#[derive(Debug, Clone, Copy)]
pub struct Representatives<'a> {
    pub high: &'a Submission,
    pub average: &'a Submission,
    pub low: &'a Submission,
}

impl<'a> Representatives<'a> {
    /// The three samples with the labels used in artifact filenames.
    pub fn labeled(&self) -> [(&'static str, &'a Submission); 3] {
        [("high", self.high), ("avg", self.average), ("low", self.low)]
    }
}

/// Picks representative submissions among the graded ones.
///
/// Graded submissions are sorted by score, ascending and stable. `low` and
/// `high` are the ends of that order; `average` is the submission whose score
/// is closest to the mean, the earliest in sorted order on ties. Returns
/// `None` when nothing is graded.
pub fn select_representatives(submissions: &[Submission]) -> Option<Representatives<'_>> {
    let mut graded: Vec<(f64, &Submission)> = submissions
        .iter()
        .filter_map(|s| s.graded_score().map(|score| (score, s)))
        .collect();

    if graded.is_empty() {
        return None;
    }

    graded.sort_by(|a, b| a.0.total_cmp(&b.0));

    let scores: Vec<f64> = graded.iter().map(|(score, _)| *score).collect();
    let avg = mean(&scores);

    // min_by keeps the first of equal elements.
    let average = graded
        .iter()
        .min_by(|a, b| (a.0 - avg).abs().total_cmp(&(b.0 - avg).abs()))
        .map(|(_, s)| *s)?;

    Some(Representatives {
        high: graded[graded.len() - 1].1,
        average,
        low: graded[0].1,
    })
}
