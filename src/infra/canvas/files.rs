use super::CanvasClient;
use abet_artifacts::fetch::HttpClient;
use abet_artifacts::services::ArtifactSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Pause between two file uploads.
const UPLOAD_SPACING: Duration = Duration::from_secs(1);

/// Reply to the first step of a Canvas file upload.
#[derive(Debug, Deserialize)]
struct UploadTicket {
    upload_url: String,
    #[serde(default)]
    upload_params: Map<String, Value>,
}

/// Publishes staged files into a course's Files area, creating folders as
/// needed and overwriting files of the same name.
pub struct CanvasFilesSink<C> {
    client: CanvasClient<C>,
    course_id: u64,
}

impl<C: HttpClient> CanvasFilesSink<C> {
    pub fn new(client: CanvasClient<C>, course_id: u64) -> Self {
        Self { client, course_id }
    }

    async fn upload_one(&self, folder: &str, path: &Path) -> Result<()> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?
            .to_string();
        let body = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        let reply = self
            .client
            .post_form(
                &format!("courses/{}/files", self.course_id),
                &[
                    ("name", filename.clone()),
                    ("parent_folder_path", folder.to_string()),
                    ("on_duplicate", "overwrite".to_string()),
                ],
            )
            .await?;
        let ticket: UploadTicket =
            serde_json::from_value(reply).context("unexpected upload ticket")?;

        let mut form = Form::new();
        for (key, value) in ticket.upload_params {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, value);
        }
        form = form.part("file", Part::bytes(body).file_name(filename));

        let resp = self
            .client
            .plain()
            .post(&ticket.upload_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        // Some Canvas deployments answer with a location that must be
        // fetched to finalize the file.
        if let Ok(reply) = resp.json::<Value>().await {
            if let Some(location) = reply.get("location").and_then(Value::as_str) {
                self.client.get_json::<Value>(location, &[]).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<C: HttpClient> ArtifactSink for CanvasFilesSink<C> {
    #[tracing::instrument(skip(self, files), fields(course_id = self.course_id, count = files.len()))]
    async fn upload(&self, folder: &str, files: &[PathBuf]) -> Result<usize> {
        let retries = self.client.config().upload_retries.max(1);
        let retry_delay = self.client.config().upload_retry_delay;
        let mut uploaded = 0;

        for path in files {
            for attempt in 1..=retries {
                match self.upload_one(folder, path).await {
                    Ok(()) => {
                        info!(file = %path.display(), "Uploaded");
                        uploaded += 1;
                        break;
                    }
                    Err(e) if attempt < retries => {
                        warn!(file = %path.display(), attempt, retries, error = %e, "Upload failed, retrying");
                        tokio::time::sleep(retry_delay).await;
                    }
                    Err(e) => {
                        error!(file = %path.display(), retries, error = %e, "Upload failed, giving up");
                    }
                }
            }
            tokio::time::sleep(UPLOAD_SPACING).await;
        }

        info!(folder, uploaded, "Canvas upload complete");
        Ok(uploaded)
    }
}
