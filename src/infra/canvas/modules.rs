use super::CanvasClient;
use abet_artifacts::fetch::HttpClient;
use abet_artifacts::lms::{FileInfo, Folder, Module, Page};
use abet_artifacts::services::CoursePublisher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

fn module_body(name: &str) -> Value {
    json!({ "module": { "name": name, "position": 1 } })
}

fn page_body(title: &str, body: &str) -> Value {
    json!({ "wiki_page": { "title": title, "body": body, "published": true } })
}

fn module_item_body(page: &Page) -> Value {
    json!({
        "module_item": {
            "title": page.title,
            "type": "Page",
            "page_url": page.url,
        }
    })
}

#[async_trait]
impl<C: HttpClient> CoursePublisher for CanvasClient<C> {
    async fn list_folders(&self, course_id: u64) -> Result<Vec<Folder>> {
        self.get_paginated(&format!("courses/{course_id}/folders"), &[])
            .await
    }

    async fn list_folder_files(&self, folder_id: u64) -> Result<Vec<FileInfo>> {
        self.get_paginated(&format!("folders/{folder_id}/files"), &[])
            .await
    }

    async fn list_modules(&self, course_id: u64) -> Result<Vec<Module>> {
        self.get_paginated(&format!("courses/{course_id}/modules"), &[])
            .await
    }

    async fn create_module(&self, course_id: u64, name: &str) -> Result<Module> {
        let module: Module = self
            .post_json(&format!("courses/{course_id}/modules"), &module_body(name))
            .await
            .with_context(|| format!("creating module {name}"))?;
        info!(module_id = module.id, name, "Module created");
        Ok(module)
    }

    async fn create_page(&self, course_id: u64, title: &str, body: &str) -> Result<Page> {
        let page: Page = self
            .post_json(&format!("courses/{course_id}/pages"), &page_body(title, body))
            .await
            .with_context(|| format!("creating page {title}"))?;
        info!(url = %page.url, "Page created");
        Ok(page)
    }

    async fn add_page_to_module(&self, course_id: u64, module_id: u64, page: &Page) -> Result<()> {
        let _: Value = self
            .post_json(
                &format!("courses/{course_id}/modules/{module_id}/items"),
                &module_item_body(page),
            )
            .await
            .with_context(|| format!("adding page {} to module {module_id}", page.url))?;
        Ok(())
    }
}
