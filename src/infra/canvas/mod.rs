//! Canvas LMS implementation of [`LmsApi`](abet_artifacts::services::LmsApi)
//! and of course-files publishing, plus the course page and module that
//! link the published files.

mod client;
mod files;
mod modules;

pub use client::CanvasClient;
pub use files::CanvasFilesSink;
