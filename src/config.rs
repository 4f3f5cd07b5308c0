use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::GtdbtkError;

pub const CALLBACK_URL_ENV: &str = "SDK_CALLBACK_URL";

/// Fixed allocation for the bigmem worker: 32 cpus and ~90 GB RAM.
pub const CPU_BUDGET: usize = 32;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub scratch: Option<String>,
    #[serde(default)]
    pub workspace_url: Option<String>,
    #[serde(default)]
    pub gtdbtk_bin: Option<String>,
    #[serde(default)]
    pub keep_staging: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub scratch: Utf8PathBuf,
    pub workspace_url: String,
    pub callback_url: String,
    pub gtdbtk_bin: String,
    pub keep_staging: bool,
    pub cpus: usize,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GtdbtkError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("deploy.json"),
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GtdbtkError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GtdbtkError::ConfigParse(err.to_string()))?;
        let callback_url = std::env::var(CALLBACK_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| GtdbtkError::MissingEnv(CALLBACK_URL_ENV.to_string()))?;

        Self::resolve_config(config, callback_url)
    }

    pub fn resolve_config(
        config: Config,
        callback_url: String,
    ) -> Result<ResolvedConfig, GtdbtkError> {
        let scratch = config
            .scratch
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| GtdbtkError::ConfigParse("missing required key: scratch".to_string()))?;
        let workspace_url = config
            .workspace_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                GtdbtkError::ConfigParse("missing required key: workspace-url".to_string())
            })?;

        Ok(ResolvedConfig {
            scratch: Utf8PathBuf::from(scratch),
            workspace_url,
            callback_url,
            gtdbtk_bin: config.gtdbtk_bin.unwrap_or_else(|| "gtdbtk".to_string()),
            keep_staging: config.keep_staging.unwrap_or(true),
            cpus: CPU_BUDGET,
        })
    }
}
