//! Run configuration.
//!
//! Every collaborator receives its settings explicitly through these structs;
//! there is no process-wide session, header map, or temp directory.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CANVAS_DOMAIN: &str = "canvas.asu.edu";
pub const DEFAULT_OUTCOME_MARKER: &str = "abet";
pub const DEFAULT_LOGIN_COLUMN: &str = "ASURITE";
pub const DEFAULT_PLAN_COLUMN: &str = "Program and Plan";

/// Connection settings for the Canvas REST API.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Scheme and host, no trailing slash (e.g. `https://canvas.asu.edu`).
    pub base_url: String,
    pub access_token: String,
    pub per_page: u32,
    /// Pause before every request, to stay clear of rate limiting.
    pub request_delay: Duration,
    pub timeout: Duration,
    pub upload_retries: u32,
    pub upload_retry_delay: Duration,
}

impl CanvasConfig {
    pub fn new(domain: &str, access_token: String) -> Self {
        Self {
            base_url: normalize_domain(domain),
            access_token,
            per_page: 100,
            request_delay: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
            upload_retries: 3,
            upload_retry_delay: Duration::from_secs(2),
        }
    }

    /// Reads `CANVAS_DOMAIN` and `CANVAS_ACCESS_TOKEN` (or the legacy
    /// lowercase `canvas_access_token`).
    pub fn from_env() -> Result<Self> {
        let domain =
            std::env::var("CANVAS_DOMAIN").unwrap_or_else(|_| DEFAULT_CANVAS_DOMAIN.to_string());
        let token = std::env::var("CANVAS_ACCESS_TOKEN")
            .or_else(|_| std::env::var("canvas_access_token"))
            .context("CANVAS_ACCESS_TOKEN must be set")?;

        Ok(Self::new(&domain, token))
    }

    /// Base URL of the versioned REST API, with trailing slash.
    pub fn api_base(&self) -> String {
        format!("{}/api/v1/", self.base_url)
    }

    /// Resolves an endpoint relative to the API base; absolute URLs pass through.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_base(), path.trim_start_matches('/'))
        }
    }
}

fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('/');
    if domain.starts_with("https://") || domain.starts_with("http://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

/// Header names of the roster columns used for classification.
///
/// Both must match a header cell exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterColumns {
    pub login: String,
    pub plan: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_COLUMN.to_string(),
            plan: DEFAULT_PLAN_COLUMN.to_string(),
        }
    }
}

/// How often an assignment is listed for an outcome when several criteria
/// of its rubric are tagged with that same outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DuplicatePolicy {
    /// Once per outcome and assignment pair.
    #[default]
    Once,
    /// Once per qualifying criterion.
    PerCriterion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeConfig {
    /// Case-insensitive marker a criterion description must contain.
    pub marker: String,
    pub duplicates: DuplicatePolicy,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_OUTCOME_MARKER.to_string(),
            duplicates: DuplicatePolicy::Once,
        }
    }
}

/// Which phases of a run execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Tasks {
    /// Stage and publish per-assignment artifacts and the syllabus.
    Extract,
    /// Build and publish per-outcome reports.
    Outcomes,
    #[default]
    All,
}

impl Tasks {
    pub fn extract(self) -> bool {
        matches!(self, Tasks::Extract | Tasks::All)
    }

    pub fn outcomes(self) -> bool {
        matches!(self, Tasks::Outcomes | Tasks::All)
    }
}

/// Everything one run needs besides the remote collaborators.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub course_id: u64,
    pub staging_dir: PathBuf,
    pub tasks: Tasks,
    pub outcomes: OutcomeConfig,
}

impl RunConfig {
    pub fn new(course_id: u64, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            course_id,
            staging_dir: staging_dir.into(),
            tasks: Tasks::All,
            outcomes: OutcomeConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_gets_scheme() {
        let cfg = CanvasConfig::new("canvas.example.edu/", "t".to_string());
        assert_eq!(cfg.base_url, "https://canvas.example.edu");
        assert_eq!(cfg.api_base(), "https://canvas.example.edu/api/v1/");
    }

    #[test]
    fn test_domain_keeps_existing_scheme() {
        let cfg = CanvasConfig::new("http://localhost:3000", "t".to_string());
        assert_eq!(cfg.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_endpoint_resolution() {
        let cfg = CanvasConfig::new("canvas.example.edu", "t".to_string());
        assert_eq!(
            cfg.endpoint("courses/1/assignments"),
            "https://canvas.example.edu/api/v1/courses/1/assignments"
        );
        assert_eq!(
            cfg.endpoint("https://files.example.edu/x"),
            "https://files.example.edu/x"
        );
    }

    #[test]
    fn test_task_selection() {
        assert!(Tasks::All.extract() && Tasks::All.outcomes());
        assert!(Tasks::Extract.extract() && !Tasks::Extract.outcomes());
        assert!(!Tasks::Outcomes.extract() && Tasks::Outcomes.outcomes());
    }
}
