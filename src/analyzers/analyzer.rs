use crate::analyzers::aggregate::aggregate_outcome;
use crate::analyzers::outcomes::{extract_outcomes, find_tagged_assignments};
use crate::analyzers::types::{CourseSnapshot, OutcomeMeta, OutcomeReport};
use crate::artifacts::{ArtifactNaming, stage_assignment, stage_syllabus};
use crate::config::{OutcomeConfig, RunConfig};
use crate::lms::{Assignment, OutcomeId};
use crate::output::{
    ReportNames, course_root_folder, sanitize_filename, semester_short_code, write_report,
};
use crate::roster::StudentMajorMap;
use crate::services::{ArtifactSink, LmsApi};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Folder, under the semester root, that outcome reports are published to.
pub const OUTCOME_REPORTS_FOLDER: &str = "_ABET_Outcome_Reports";

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub assignments: usize,
    pub staged_files: usize,
    pub reports: Vec<PathBuf>,
    pub uploaded: usize,
}

/// Builds one report per outcome found in `assignments`, in outcome id order.
pub fn build_outcome_reports(
    assignments: &[Assignment],
    snapshot: &CourseSnapshot,
    majors: &StudentMajorMap,
    config: &OutcomeConfig,
) -> Vec<(OutcomeId, OutcomeReport)> {
    let tagged = find_tagged_assignments(assignments, &config.marker);
    info!(tagged = tagged.len(), "Outcome-tagged assignments found");

    let index = extract_outcomes(tagged, config);

    index
        .assignments
        .iter()
        .map(|(outcome, listed)| {
            let meta = index.meta.get(outcome).cloned().unwrap_or_else(|| OutcomeMeta {
                title: format!("Outcome_ID_{outcome}"),
                ..Default::default()
            });
            let report = aggregate_outcome(outcome, &meta, listed, snapshot, majors);
            (outcome.clone(), report)
        })
        .collect()
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("clearing {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

async fn publish(sink: Option<&dyn ArtifactSink>, folder: &str, files: &[PathBuf]) -> Result<usize> {
    match sink {
        Some(sink) if !files.is_empty() => sink.upload(folder, files).await,
        _ => Ok(0),
    }
}

/// Runs the configured tasks for one course.
///
/// Course data is fetched once into a [`CourseSnapshot`]; artifacts and
/// reports are staged under `config.staging_dir` (cleared first) and handed
/// to `sink` when one is given.
#[tracing::instrument(skip_all, fields(course_id = config.course_id, tasks = ?config.tasks))]
pub async fn run(
    lms: &dyn LmsApi,
    sink: Option<&dyn ArtifactSink>,
    config: &RunConfig,
    majors: &StudentMajorMap,
) -> Result<RunSummary> {
    let course = lms
        .get_course(config.course_id)
        .await
        .context("course not found or access denied")?;

    let root_folder = course_root_folder(&course);
    let naming = ArtifactNaming {
        course_code: course.course_code.clone(),
        semester: semester_short_code(course.term_name.as_deref()),
    };
    info!(course = %course.name, root_folder = %root_folder, "Course loaded");

    reset_dir(&config.staging_dir)?;

    let assignments = lms
        .list_assignments(config.course_id)
        .await
        .context("fetching assignments")?;

    let mut summary = RunSummary {
        assignments: assignments.len(),
        ..Default::default()
    };

    if assignments.is_empty() {
        info!("No assignments found in the course");
        return Ok(summary);
    }

    if config.tasks.extract() {
        let files = stage_syllabus(lms, &course, &config.staging_dir).await?;
        summary.staged_files += files.len();
        summary.uploaded += publish(sink, &format!("{root_folder}/Syllabus"), &files).await?;
    }

    let mut snapshot = CourseSnapshot::new(course);

    for assignment in &assignments {
        let submissions = lms
            .list_submissions(config.course_id, assignment.id)
            .await
            .with_context(|| format!("fetching submissions for assignment {}", assignment.id))?;

        let staged = stage_assignment(
            lms,
            assignment,
            &submissions,
            &config.staging_dir,
            &naming,
            config.tasks.extract(),
        )
        .await?;

        if config.tasks.extract() {
            summary.staged_files += staged.files.len();
            let folder = format!(
                "{root_folder}/Assignments/{}",
                sanitize_filename(&assignment.name)
            );
            summary.uploaded += publish(sink, &folder, &staged.files).await?;
        }

        snapshot.description_texts.insert(assignment.id, staged.texts);
        snapshot.submissions.insert(assignment.id, submissions);
    }

    if config.tasks.outcomes() {
        let reports = build_outcome_reports(&assignments, &snapshot, majors, &config.outcomes);
        if reports.is_empty() {
            info!("No assignments with rubric outcomes found");
        }

        let report_dir = config.staging_dir.join(OUTCOME_REPORTS_FOLDER);
        fs::create_dir_all(&report_dir)
            .with_context(|| format!("creating {}", report_dir.display()))?;

        let mut names = ReportNames::default();
        for (outcome, report) in &reports {
            if report.results.overall_summary.sample_size == 0 {
                warn!(
                    title = %report.outcome_identification.title,
                    "No rubric-graded submissions for outcome"
                );
            }
            let filename = names.claim(&report.outcome_identification.title, outcome);
            summary.reports.push(write_report(&report_dir, &filename, report)?);
        }

        summary.staged_files += summary.reports.len();
        summary.uploaded += publish(
            sink,
            &format!("{root_folder}/{OUTCOME_REPORTS_FOLDER}"),
            &summary.reports,
        )
        .await?;
    }

    info!(
        assignments = summary.assignments,
        staged_files = summary.staged_files,
        reports = summary.reports.len(),
        uploaded = summary.uploaded,
        "Run complete"
    );
    Ok(summary)
}
