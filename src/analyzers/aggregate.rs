use crate::analyzers::types::{
    ContributingAssignment, CourseSnapshot, OutcomeMeta, OutcomeReport, OutcomeResults,
    ScoredSubmission, Tally,
};
use crate::lms::{Assignment, OutcomeId, Submission};
use crate::roster::StudentMajorMap;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Tags every graded submission that has an assessment entry for `outcome`
/// with its sub-score and the assignment's point scale for the outcome.
///
/// Submissions without a usable entry are left out; partial grading is normal.
pub fn score_submissions<'a>(
    outcome: &OutcomeId,
    points_possible: f64,
    submissions: &'a [Submission],
) -> Vec<ScoredSubmission<'a>> {
    submissions
        .iter()
        .filter(|s| s.is_graded())
        .filter_map(|submission| {
            let outcome_score = submission.outcome_points(outcome)?;
            Some(ScoredSubmission {
                submission,
                outcome_score,
                outcome_points_possible: points_possible,
            })
        })
        .collect()
}

/// Builds the report for one outcome from the assignments that assess it.
///
/// Each assignment's sub-scores are normalized against that assignment's own
/// criterion points. A pooled submission is also counted in the bucket of its
/// owner's major when the owner's login id is in `majors`; otherwise it only
/// counts toward the overall summary.
pub fn aggregate_outcome(
    outcome: &OutcomeId,
    meta: &OutcomeMeta,
    assignments: &[&Assignment],
    snapshot: &CourseSnapshot,
    majors: &StudentMajorMap,
) -> OutcomeReport {
    let mut pool: Vec<ScoredSubmission<'_>> = Vec::new();
    let mut contributing = Vec::new();

    for assignment in assignments {
        let Some(criterion) = assignment.criterion_for(outcome) else {
            debug!(
                outcome = %outcome,
                assignment_id = assignment.id,
                "Assignment has no rubric criterion for this outcome, skipping"
            );
            continue;
        };

        let Some(points_possible) = criterion.points_possible() else {
            debug!(
                outcome = %outcome,
                assignment_id = assignment.id,
                points = ?criterion.points,
                "Outcome criterion has no usable point scale, skipping"
            );
            continue;
        };

        let submissions = snapshot.submissions_for(assignment.id);
        let scored = score_submissions(outcome, points_possible, submissions);
        debug!(
            outcome = %outcome,
            assignment_id = assignment.id,
            fetched = submissions.len(),
            scored = scored.len(),
            points_possible,
            "Assignment submissions pooled"
        );
        pool.extend(scored);

        contributing.push(ContributingAssignment {
            id: assignment.id,
            name: assignment.name.clone(),
            description: assignment.description.clone(),
            description_files_content: snapshot
                .description_texts
                .get(&assignment.id)
                .cloned()
                .unwrap_or_default(),
        });
    }

    let mut overall = Tally::default();
    let mut by_major: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut unattributed = 0usize;

    for scored in &pool {
        let competent = scored.is_competent();
        overall.add(competent);

        match scored
            .submission
            .login_id()
            .and_then(|login| majors.get(login))
        {
            Some(major) => by_major.entry(major.as_str()).or_default().add(competent),
            None => unattributed += 1,
        }
    }

    let results = OutcomeResults {
        overall_summary: overall.summary(),
        distribution_by_major: by_major
            .into_iter()
            .map(|(major, tally)| (major.to_string(), tally.summary()))
            .collect(),
    };

    info!(
        outcome = %outcome,
        title = %meta.title,
        assignments = contributing.len(),
        sample_size = results.overall_summary.sample_size,
        percent_competent = results.overall_summary.percent_competent,
        outcome_met = results.overall_summary.outcome_met,
        unattributed,
        "Outcome aggregated"
    );

    OutcomeReport {
        outcome_identification: meta.clone(),
        course_identification: snapshot.course.raw.clone(),
        results,
        contributing_assignments: contributing,
    }
}
