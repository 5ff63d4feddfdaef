// Configuration merging with priority
// Priority order: CLI -> config file -> defaults

use super::HarvestConfig;
use std::path::PathBuf;

/// Command-line overrides; `None` keeps the file/default value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub origin: Option<String>,
    pub auth_token: Option<String>,
    pub cookie: Option<String>,
    pub enrich: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub settle_delay_ms: Option<u64>,
    pub max_duration_ms: Option<u64>,
}

/// Merge config values with command-line overrides
pub fn merge_overrides(file_config: &HarvestConfig, overrides: &ConfigOverrides) -> HarvestConfig {
    let mut merged = file_config.clone();

    if let Some(origin) = &overrides.origin {
        merged.backend.origin = Some(origin.trim_end_matches('/').to_string());
    }
    if overrides.auth_token.is_some() {
        merged.backend.auth_token = overrides.auth_token.clone();
    }
    if overrides.cookie.is_some() {
        merged.backend.cookie = overrides.cookie.clone();
    }
    if let Some(enrich) = overrides.enrich {
        merged.backend.enabled = enrich;
    }
    if let Some(dir) = &overrides.output_dir {
        merged.output.directory = dir.clone();
    }
    merged.timing.settle_delay_ms = overrides
        .settle_delay_ms
        .unwrap_or(file_config.timing.settle_delay_ms);
    merged.timing.max_duration_ms = overrides
        .max_duration_ms
        .unwrap_or(file_config.timing.max_duration_ms);

    merged
}
