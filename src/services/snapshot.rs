//! Course data saved to, and served from, a local directory.
//!
//! Layout:
//! ```text
//! <dir>/course.json
//! <dir>/assignments.json
//! <dir>/submissions/<assignment_id>.json
//! <dir>/files/<file_id>.json          (optional, FileInfo records)
//! ```
//! A `FileInfo` url that is a relative path is resolved against `<dir>`.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::LmsApi;
use crate::lms::{Assignment, AssignmentId, Course, FileInfo, Submission};
use crate::output::write_json;

/// [`LmsApi`] over a directory written by [`save_snapshot`].
pub struct SnapshotLms {
    dir: PathBuf,
}

impl SnapshotLms {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.join("course.json").is_file() {
            bail!("{} is not a course snapshot (no course.json)", dir.display());
        }
        Ok(Self { dir })
    }

    fn read<T: DeserializeOwned>(&self, relative: &Path) -> Result<T> {
        let path = self.dir.join(relative);
        let content =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

#[async_trait::async_trait]
impl LmsApi for SnapshotLms {
    async fn get_course(&self, _course_id: u64) -> Result<Course> {
        let raw: serde_json::Value = self.read(Path::new("course.json"))?;
        Ok(Course::from_value(raw)?)
    }

    async fn list_assignments(&self, _course_id: u64) -> Result<Vec<Assignment>> {
        self.read(Path::new("assignments.json"))
    }

    async fn list_submissions(
        &self,
        _course_id: u64,
        assignment_id: AssignmentId,
    ) -> Result<Vec<Submission>> {
        let relative = PathBuf::from("submissions").join(format!("{assignment_id}.json"));
        if !self.dir.join(&relative).is_file() {
            return Ok(Vec::new());
        }
        self.read(&relative)
    }

    async fn get_file(&self, file_id: u64) -> Result<FileInfo> {
        self.read(&PathBuf::from("files").join(format!("{file_id}.json")))
    }

    async fn download(&self, url: &str) -> Result<Bytes> {
        if url.contains("://") {
            bail!("{url} is not part of the snapshot");
        }
        let path = self.dir.join(url);
        let body = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Bytes::from(body))
    }
}

/// Saves a course, its assignments and all their submissions under `dir`.
#[tracing::instrument(skip(lms, dir), fields(dir = %dir.display()))]
pub async fn save_snapshot(lms: &dyn LmsApi, course_id: u64, dir: &Path) -> Result<usize> {
    let submissions_dir = dir.join("submissions");
    fs::create_dir_all(&submissions_dir)
        .with_context(|| format!("creating {}", submissions_dir.display()))?;

    let course = lms.get_course(course_id).await?;
    write_json(&dir.join("course.json"), &course.raw)?;

    let assignments = lms.list_assignments(course_id).await?;
    write_json(&dir.join("assignments.json"), &assignments)?;

    let mut submission_count = 0;
    for assignment in &assignments {
        let submissions = lms.list_submissions(course_id, assignment.id).await?;
        submission_count += submissions.len();
        write_json(
            &submissions_dir.join(format!("{}.json", assignment.id)),
            &submissions,
        )?;
    }

    info!(
        course_id,
        assignments = assignments.len(),
        submissions = submission_count,
        "Course snapshot saved"
    );
    Ok(assignments.len())
}
