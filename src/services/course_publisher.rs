//! Trait for organizing published artifacts inside the destination course.

use anyhow::Result;

use crate::lms::{FileInfo, Folder, Module, Page};

/// Reads the destination course's Files area and creates the page and
/// module that link the published artifacts.
#[async_trait::async_trait]
pub trait CoursePublisher: Send + Sync {
    /// Every folder of the course Files area.
    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>>;

    /// Files directly inside one folder.
    async fn list_folder_files(&self, folder_id: u64) -> Result<Vec<FileInfo>>;

    async fn list_modules(&self, course_id: u64) -> Result<Vec<Module>>;

    /// Creates a module at the top of the course's module list.
    async fn create_module(&self, course_id: u64, name: &str) -> Result<Module>;

    async fn create_page(&self, course_id: u64, title: &str, body: &str) -> Result<Page>;

    async fn add_page_to_module(&self, course_id: u64, module_id: u64, page: &Page) -> Result<()>;
}
