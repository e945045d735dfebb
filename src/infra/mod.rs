//! Concrete collaborators: the Canvas REST API and artifact destinations.

pub mod canvas;
pub mod s3;
