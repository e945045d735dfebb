//! Trait for reading course data from a learning-management system.

use anyhow::Result;
use bytes::Bytes;

use crate::lms::{Assignment, AssignmentId, Course, FileInfo, Submission};

/// Abstraction over the remote course the artifacts are extracted from.
#[async_trait::async_trait]
pub trait LmsApi: Send + Sync {
    /// Course record, including its term and syllabus body.
    async fn get_course(&self, course_id: u64) -> Result<Course>;

    /// All assignments of the course, rubrics included.
    async fn list_assignments(&self, course_id: u64) -> Result<Vec<Assignment>>;

    /// All submissions of one assignment, with user records and detailed
    /// rubric assessments, in the order the remote system returns them.
    async fn list_submissions(
        &self,
        course_id: u64,
        assignment_id: AssignmentId,
    ) -> Result<Vec<Submission>>;

    /// Metadata of a course file referenced from HTML content.
    async fn get_file(&self, file_id: u64) -> Result<FileInfo>;

    /// Downloads a file or attachment body.
    async fn download(&self, url: &str) -> Result<Bytes>;
}
