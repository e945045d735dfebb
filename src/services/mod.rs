//! Collaborator interfaces the pipeline is written against.
//!
//! [`LmsApi`] reads course data, [`ArtifactSink`] publishes staged files and
//! [`CoursePublisher`] links them from a course page and module.
//! [`SnapshotLms`] serves a course previously saved to disk.

mod artifact_sink;
mod course_publisher;
mod lms_api;
mod snapshot;

pub use artifact_sink::ArtifactSink;
pub use course_publisher::CoursePublisher;
pub use lms_api::LmsApi;
pub use snapshot::{SnapshotLms, save_snapshot};
