//! Typed records for the learning-management-system data the tool reads.
//!
//! Raw JSON from the remote API is validated and deserialized here, at the
//! collaborator boundary. Everything downstream works on these structs.

mod types;

pub use types::{
    Assessment, AssessmentEntry, Assignment, AssignmentId, Attachment, Course, CriterionScore,
    Criterion, FileInfo, Folder, Module, OutcomeId, Page, Submission, User, UserId, GRADED,
};
