//! Engine configuration.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `TESTDECK_DEFAULT_PAGE_SIZE` | Rows per page when a request omits `pageSize` (default: 25) |
//! | `TESTDECK_MAX_PAGE_SIZE` | Largest numeric `pageSize` accepted (default: 1000) |
//! | `TESTDECK_DRILLDOWN_LIMIT` | Drill-down records per call when no limit is given (default: 50) |
//! | `TESTDECK_MAX_DRILLDOWN_LIMIT` | Upper clamp for drill-down limits (default: 500) |
//! | `TESTDECK_FLAKY_MIN_FLIPS` | Minimum status flips for a test to appear in flaky reports (default: 1) |
//! | `TESTDECK_ANONYMIZE_PUBLIC` | Pseudonymize user names in public/password reports |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,

    #[serde(default = "default_drilldown_limit")]
    pub default_drilldown_limit: u32,

    #[serde(default = "default_max_drilldown_limit")]
    pub max_drilldown_limit: u32,

    #[serde(default = "default_flaky_min_flips")]
    pub flaky_min_flips: u32,

    /// Replace user names with `User N` pseudonyms when sharing outside the workspace.
    #[serde(default)]
    pub anonymize_public: bool,
}

fn default_page_size() -> u32 {
    25
}

fn default_max_page_size() -> u32 {
    1000
}

fn default_drilldown_limit() -> u32 {
    50
}

fn default_max_drilldown_limit() -> u32 {
    500
}

fn default_flaky_min_flips() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            default_drilldown_limit: default_drilldown_limit(),
            max_drilldown_limit: default_max_drilldown_limit(),
            flaky_min_flips: default_flaky_min_flips(),
            anonymize_public: false,
        }
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Override fields with any `TESTDECK_*` variables that are set.
    pub fn merge_env(mut self) -> Self {
        if let Some(v) = env_u32("TESTDECK_DEFAULT_PAGE_SIZE") {
            self.default_page_size = v;
        }
        if let Some(v) = env_u32("TESTDECK_MAX_PAGE_SIZE") {
            self.max_page_size = v;
        }
        if let Some(v) = env_u32("TESTDECK_DRILLDOWN_LIMIT") {
            self.default_drilldown_limit = v;
        }
        if let Some(v) = env_u32("TESTDECK_MAX_DRILLDOWN_LIMIT") {
            self.max_drilldown_limit = v;
        }
        if let Some(v) = env_u32("TESTDECK_FLAKY_MIN_FLIPS") {
            self.flaky_min_flips = v;
        }
        if let Some(v) = env_bool("TESTDECK_ANONYMIZE_PUBLIC") {
            self.anonymize_public = v;
        }
        self
    }

    pub fn from_yaml_str(raw: &str) -> ReportResult<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| ReportError::config(format!("failed to parse config: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> ReportResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::config(format!("failed to read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    fn check(&self) -> ReportResult<()> {
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ReportError::config(format!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            )));
        }
        if self.default_drilldown_limit == 0
            || self.default_drilldown_limit > self.max_drilldown_limit
        {
            return Err(ReportError::config(format!(
                "default_drilldown_limit must be between 1 and max_drilldown_limit ({})",
                self.max_drilldown_limit
            )));
        }
        Ok(())
    }

    pub fn with_drilldown_limits(mut self, default: u32, max: u32) -> Self {
        self.default_drilldown_limit = default;
        self.max_drilldown_limit = max;
        self
    }

    pub fn with_flaky_min_flips(mut self, flips: u32) -> Self {
        self.flaky_min_flips = flips;
        self
    }

    pub fn with_anonymize_public(mut self, anonymize: bool) -> Self {
        self.anonymize_public = anonymize;
        self
    }

    /// Clamp a requested drill-down limit; `None` or zero means the default.
    pub fn drilldown_limit(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(0) | None => self.default_drilldown_limit,
            Some(n) => n.min(self.max_drilldown_limit),
        }
    }
}
