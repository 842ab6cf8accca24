use ::config::{Config, Environment};
use serde::Deserialize;

use crate::types::{PublishError, PublishResult};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Settings for a publish run, layered from defaults, the environment
/// (`ACCESS_KEY`, `SECRET_KEY`, `ENDPOINT`, `REGION`, `PATH_STYLE`,
/// `PUBLISH_CONCURRENCY`) and command-line overrides, in that order.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub region: String,
    pub path_style: bool,
    #[serde(rename = "publish_concurrency")]
    pub concurrency: usize,
}

/// Connection settings for the S3-compatible backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub region: String,
    pub path_style: bool,
}

/// Values supplied on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub concurrency: Option<usize>,
}

impl PublishConfig {
    pub fn load(overrides: &ConfigOverrides) -> PublishResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_env(Environment::default(), overrides)
    }

    fn from_env(env: Environment, overrides: &ConfigOverrides) -> PublishResult<Self> {
        let config: PublishConfig = Config::builder()
            .set_default("region", DEFAULT_REGION)?
            .set_default("path_style", true)?
            .set_default("publish_concurrency", 1)?
            .add_source(env)
            .set_override_option("access_key", overrides.access_key.clone())?
            .set_override_option("secret_key", overrides.secret_key.clone())?
            .set_override_option("endpoint", overrides.endpoint.clone())?
            .set_override_option("region", overrides.region.clone())?
            .set_override_option("publish_concurrency", overrides.concurrency.map(|c| c as i64))?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PublishResult<()> {
        if self.concurrency == 0 {
            return Err(PublishError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.region.trim().is_empty() {
            return Err(PublishError::Config("region must not be empty".to_string()));
        }
        Ok(())
    }

    /// Backend settings; credentials and endpoint are required here.
    pub fn storage(&self) -> PublishResult<StorageConfig> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PublishError::Config(format!("{name} must be set")))
        };

        Ok(StorageConfig {
            access_key: required(&self.access_key, "ACCESS_KEY")?,
            secret_key: required(&self.secret_key, "SECRET_KEY")?,
            endpoint: normalize_endpoint(&required(&self.endpoint, "ENDPOINT")?),
            region: self.region.clone(),
            path_style: self.path_style,
        })
    }
}

/// Endpoints given as a bare host are reached over HTTPS.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}
