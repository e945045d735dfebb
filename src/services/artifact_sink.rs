//! Trait for publishing staged artifacts.

use anyhow::Result;
use std::path::PathBuf;

/// Destination for staged files, e.g. another course's file storage.
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Publishes `files` under `folder`, overwriting existing files of the
    /// same name. Returns how many were published; individual failures are
    /// logged and skipped.
    async fn upload(&self, folder: &str, files: &[PathBuf]) -> Result<usize>;
}
