use abet_artifacts::services::ArtifactSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Publishes staged files to an S3 bucket, one object per file, keyed by
/// destination folder and file name.
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    gzip: bool,
}

impl S3Sink {
    pub async fn from_env(bucket: String, gzip: bool) -> Self {
        let config = aws_config::load_from_env().await;
        info!(bucket = %bucket, gzip, "S3 upload enabled");
        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket,
            gzip,
        }
    }

    async fn put(&self, folder: &str, path: &Path) -> Result<String> {
        let key = object_key(folder, path, self.gzip)
            .with_context(|| format!("{} has no usable file name", path.display()))?;
        let contents = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

        let (body, content_type) = if self.gzip {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&contents)?;
            (encoder.finish()?, "application/gzip")
        } else {
            (contents, content_type(path))
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await?;

        Ok(key)
    }
}

/// Object key of a staged file: `<folder>/<file name>`, with `.gz` appended
/// when the body is compressed.
pub fn object_key(folder: &str, path: &Path, gzip: bool) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let folder = folder.trim_matches('/');
    let key = if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    };
    Some(if gzip { format!("{key}.gz") } else { key })
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ArtifactSink for S3Sink {
    #[tracing::instrument(skip(self, files), fields(bucket = %self.bucket, count = files.len()))]
    async fn upload(&self, folder: &str, files: &[PathBuf]) -> Result<usize> {
        let mut upload_count = 0;
        for path in files {
            match self.put(folder, path).await {
                Ok(key) => {
                    info!(key = %key, "Uploaded to S3");
                    upload_count += 1;
                }
                Err(e) => error!(file = %path.display(), error = %e, "S3 upload failed"),
            }
        }

        info!(folder, upload_count, "S3 upload complete");
        Ok(upload_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        let path = Path::new("staging/_ABET_Outcome_Reports/Outcome_1.json");
        assert_eq!(
            object_key("2025Fall_CSE_310/_ABET_Outcome_Reports", path, false).as_deref(),
            Some("2025Fall_CSE_310/_ABET_Outcome_Reports/Outcome_1.json")
        );
        assert_eq!(
            object_key("/root/", path, true).as_deref(),
            Some("root/Outcome_1.json.gz")
        );
        assert_eq!(object_key("", path, false).as_deref(), Some("Outcome_1.json"));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("a/grade_report_1.csv")), "text/csv");
        assert_eq!(content_type(Path::new("rubric.JSON")), "application/json");
        assert_eq!(content_type(Path::new("essay.docx")), "application/octet-stream");
    }
}
