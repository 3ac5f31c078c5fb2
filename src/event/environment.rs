// Static process metadata attached to every event

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub os: String,
    pub family: String,
    pub architecture: String,
    pub pid: u32,
}

/// CI build metadata, read from the Buildkite agent environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
}

impl CiMetadata {
    /// Read CI metadata through `lookup`; `None` when no build id is exposed
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let build_id = var("BUILDKITE_BUILD_ID")?;
        Some(Self {
            build_id: Some(build_id),
            build_number: var("BUILDKITE_BUILD_NUMBER"),
            build_url: var("BUILDKITE_BUILD_URL"),
            branch: var("BUILDKITE_BRANCH"),
            commit: var("BUILDKITE_COMMIT"),
            job_id: var("BUILDKITE_JOB_ID"),
            pipeline_slug: var("BUILDKITE_PIPELINE_SLUG"),
            agent_name: var("BUILDKITE_AGENT_NAME"),
            retry_count: var("BUILDKITE_RETRY_COUNT").and_then(|v| v.parse().ok()),
            // Buildkite sets this to "false" outside PR builds
            pull_request: var("BUILDKITE_PULL_REQUEST").filter(|v| v != "false"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentMetadata {
    pub host: HostMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ci: Option<CiMetadata>,
}

impl EnvironmentMetadata {
    /// Capture metadata for the current process
    pub fn capture() -> Self {
        let name = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());

        Self {
            host: HostMetadata {
                name,
                os: std::env::consts::OS.to_string(),
                family: std::env::consts::FAMILY.to_string(),
                architecture: std::env::consts::ARCH.to_string(),
                pid: std::process::id(),
            },
            ci: CiMetadata::from_lookup(|name| std::env::var(name).ok()),
        }
    }
}

static ENVIRONMENT: Lazy<Arc<EnvironmentMetadata>> =
    Lazy::new(|| Arc::new(EnvironmentMetadata::capture()));

/// Process-wide environment metadata, captured on first use
pub fn environment_metadata() -> Arc<EnvironmentMetadata> {
    Arc::clone(&ENVIRONMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ci_metadata_absent_without_build_id() {
        let vars: HashMap<&str, &str> = HashMap::from([("BUILDKITE_BRANCH", "main")]);
        let ci = CiMetadata::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(ci.is_none());
    }

    #[test]
    fn test_ci_metadata_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BUILDKITE_BUILD_ID", "0190"),
            ("BUILDKITE_BRANCH", "main"),
            ("BUILDKITE_RETRY_COUNT", "2"),
            ("BUILDKITE_PULL_REQUEST", "false"),
            ("BUILDKITE_COMMIT", ""),
        ]);
        let ci = CiMetadata::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(ci.build_id.as_deref(), Some("0190"));
        assert_eq!(ci.branch.as_deref(), Some("main"));
        assert_eq!(ci.retry_count, Some(2));
        assert!(ci.pull_request.is_none());
        assert!(ci.commit.is_none());
    }

    #[test]
    fn test_environment_is_shared() {
        let a = environment_metadata();
        let b = environment_metadata();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.host.os.is_empty());
    }
}
