//! Local staging of per-assignment artifacts and the course syllabus.
//!
//! Download failures of individual files are logged and skipped; failures
//! writing into the staging directory are returned.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::analyzers::sample::select_representatives;
use crate::analyzers::types::DescriptionTexts;
use crate::documents::extract_text;
use crate::lms::{Assignment, Course, CriterionScore, Submission};
use crate::output::{
    representative_filename, sanitize_filename, write_grade_report, write_json,
};
use crate::services::LmsApi;

static FILE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/files/(\d+)").expect("file link pattern is valid"));

/// Course code and semester code used to name representative files.
#[derive(Debug, Clone)]
pub struct ArtifactNaming {
    pub course_code: String,
    pub semester: String,
}

/// Files staged for one assignment.
#[derive(Debug, Default)]
pub struct StagedAssignment {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub texts: DescriptionTexts,
}

#[derive(Serialize)]
struct RepresentativeDetails<'a> {
    score: Option<f64>,
    points_possible: Option<f64>,
    original_filename: &'a str,
    user_id: Option<u64>,
    rubric_assessment: Option<&'a BTreeMap<String, CriterionScore>>,
}

/// Ids of course files linked from HTML, without repeats, in order of appearance.
pub fn linked_file_ids(html: &str) -> Vec<u64> {
    let mut seen = HashSet::new();
    FILE_LINK_RE
        .captures_iter(html)
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Directory name of an assignment inside the staging directory.
pub fn assignment_dir_name(assignment: &Assignment) -> String {
    format!("{}_{}", assignment.id, sanitize_filename(&assignment.name))
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

async fn download_to(lms: &dyn LmsApi, url: &str, path: &Path) -> Option<bytes::Bytes> {
    match lms.download(url).await {
        Ok(body) => match fs::write(path, &body) {
            Ok(()) => Some(body),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save download");
                None
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Download failed");
            None
        }
    }
}

/// Downloads every file linked from `html` into `dir`, extracting text from
/// the ones in text formats.
pub async fn stage_linked_files(
    lms: &dyn LmsApi,
    html: &str,
    dir: &Path,
) -> (Vec<PathBuf>, DescriptionTexts) {
    let mut files = Vec::new();
    let mut texts = DescriptionTexts::new();

    for file_id in linked_file_ids(html) {
        let info = match lms.get_file(file_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(file_id, error = %e, "Could not look up linked file");
                continue;
            }
        };

        let path = dir.join(sanitize_filename(&info.filename));
        if let Some(body) = download_to(lms, &info.url, &path).await {
            if let Some(text) = extract_text(&info.filename, &body) {
                texts.insert(info.filename.clone(), text);
            }
            files.push(path);
        }
    }

    (files, texts)
}

/// Stages an assignment's artifacts under `staging/<id>_<name>/`.
///
/// Linked description files are always fetched, since their text feeds the
/// outcome reports. With `full` set, the description, rubric, representative
/// submissions and grade report are staged as well.
#[tracing::instrument(skip_all, fields(assignment_id = assignment.id, full = full))]
pub async fn stage_assignment(
    lms: &dyn LmsApi,
    assignment: &Assignment,
    submissions: &[Submission],
    staging: &Path,
    naming: &ArtifactNaming,
    full: bool,
) -> Result<StagedAssignment> {
    let dir = staging.join(assignment_dir_name(assignment));
    create_dir(&dir)?;
    let mut staged = StagedAssignment {
        dir: dir.clone(),
        ..Default::default()
    };

    if let Some(description) = assignment.description_text() {
        if full {
            let path = dir.join("description.html");
            fs::write(&path, description).with_context(|| format!("writing {}", path.display()))?;
            staged.files.push(path);
        }

        let (files, texts) = stage_linked_files(lms, description, &dir).await;
        staged.files.extend(files);
        staged.texts = texts;
    }

    if !full {
        return Ok(staged);
    }

    if !assignment.criteria().is_empty() {
        let path = dir.join("rubric.json");
        write_json(&path, &assignment.criteria())?;
        staged.files.push(path);
    }

    if let Some(reps) = select_representatives(submissions) {
        for (label, submission) in reps.labeled() {
            let Some(attachment) = submission.attachments().first() else {
                debug!(label, submission_id = submission.id, "Representative has no attachment");
                continue;
            };

            if let Some(url) = attachment.url.as_deref() {
                let filename = representative_filename(
                    &naming.course_code,
                    &naming.semester,
                    &assignment.name,
                    label,
                    attachment.extension(),
                );
                let path = dir.join(filename);
                if download_to(lms, url, &path).await.is_some() {
                    staged.files.push(path);
                }
            }

            let details = RepresentativeDetails {
                score: submission.score,
                points_possible: assignment.points_possible,
                original_filename: &attachment.filename,
                user_id: submission.owner_id(),
                rubric_assessment: submission.rubric_assessment.as_ref(),
            };
            let path = dir.join(format!("{label}_details.json"));
            write_json(&path, &details)?;
            staged.files.push(path);
        }
    }

    if submissions.is_empty() {
        debug!("No submissions, skipping grade report");
    } else {
        let path = dir.join(format!("grade_report_{}.csv", assignment.id));
        write_grade_report(&path, submissions)?;
        staged.files.push(path);
    }

    info!(files = staged.files.len(), texts = staged.texts.len(), "Assignment staged");
    Ok(staged)
}

/// Stages the syllabus body and the PDFs linked from it under `staging/_Syllabus/`.
#[tracing::instrument(skip_all, fields(course_id = course.id))]
pub async fn stage_syllabus(lms: &dyn LmsApi, course: &Course, staging: &Path) -> Result<Vec<PathBuf>> {
    let Some(body) = course.syllabus_body.as_deref() else {
        debug!("Course has no syllabus body");
        return Ok(Vec::new());
    };

    let dir = staging.join("_Syllabus");
    create_dir(&dir)?;

    let path = dir.join("syllabus_body.html");
    fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    let mut files = vec![path];

    for file_id in linked_file_ids(body) {
        match lms.get_file(file_id).await {
            Ok(info) if info.filename.to_lowercase().ends_with(".pdf") => {
                let path = dir.join(format!("syllabus_{}", sanitize_filename(&info.filename)));
                if download_to(lms, &info.url, &path).await.is_some() {
                    files.push(path);
                }
            }
            Ok(info) => debug!(filename = %info.filename, "Skipping non-PDF syllabus link"),
            Err(e) => warn!(file_id, error = %e, "Could not look up syllabus file"),
        }
    }

    info!(files = files.len(), "Syllabus staged");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linked_file_ids_unique_in_order() {
        let html = r#"<a href="/courses/1/files/55/download">a</a>
            <img src="https://canvas.example.edu/courses/1/files/12/preview">
            <a href="/files/55">again</a> /files/abc"#;

        assert_eq!(linked_file_ids(html), vec![55, 12]);
    }

    #[test]
    fn test_linked_file_ids_none() {
        assert!(linked_file_ids("<p>No files</p>").is_empty());
    }

    #[test]
    fn test_assignment_dir_name() {
        let a = Assignment {
            id: 77,
            name: "Lab 3: Trees".to_string(),
            ..Default::default()
        };
        assert_eq!(assignment_dir_name(&a), "77_Lab_3__Trees");
    }
}
