//! Configuration loading
//!
//! Sources, later wins: built-in defaults, the `APP_ENV` profile, the
//! optional config file, then environment variables and flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Args;

use docbridge_common::config::{Config, LogFormat, Profile};
use docbridge_store::redact_uri;

/// Settings that may come from the environment or the command line
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Configuration file path (TOML or JSON)
    #[arg(short, long, global = true, env = "DOCBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deployment profile: development, production or testing
    #[arg(long, global = true, env = "APP_ENV")]
    pub profile: Option<String>,

    /// Document store connection string; `memory://` runs without a database
    #[arg(long, global = true, env = "MONGO_URI")]
    pub mongo_uri: Option<String>,

    /// Listen address
    #[arg(long, global = true, env = "HOST")]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long, global = true, env = "PORT")]
    pub port: Option<u16>,

    /// HTTP worker threads (0 = one per core)
    #[arg(long, global = true, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Allowed CORS origins, comma separated; `*` allows any
    #[arg(long, global = true, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    #[arg(long, global = true, env = "DEBUG", value_parser = BoolishValueParser::new())]
    pub debug: Option<bool>,

    /// Log filter, e.g. `info` or `docbridge=debug`
    #[arg(long, global = true, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output: text or json
    #[arg(long, global = true, env = "LOG_FORMAT")]
    pub log_format: Option<String>,

    #[arg(long, global = true, env = "DEFAULT_LIMIT")]
    pub default_limit: Option<u64>,

    #[arg(long, global = true, env = "DEFAULT_SKIP")]
    pub default_skip: Option<u64>,

    #[arg(long, global = true, env = "MAX_LIMIT")]
    pub max_limit: Option<u64>,

    #[arg(long, global = true, env = "DEFAULT_SORT_FIELD")]
    pub default_sort_field: Option<String>,

    /// 1 for ascending, -1 for descending
    #[arg(long, global = true, env = "DEFAULT_SORT_ORDER", allow_hyphen_values = true)]
    pub default_sort_order: Option<i32>,
}

/// Resolve the effective configuration and validate it
pub async fn load(overrides: &Overrides) -> Result<Config> {
    let profile = match overrides.profile.as_deref() {
        Some(name) => name.parse::<Profile>()?,
        None => Profile::default(),
    };

    let mut config = Config::for_profile(profile);
    if let Some(path) = &overrides.config {
        config = config
            .load_over(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
    }

    apply(&mut config, overrides)?;
    config.validate()?;
    Ok(config)
}

/// Render the configuration as TOML with store credentials masked
pub fn render(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    shown.store.uri = redact_uri(&shown.store.uri);
    Ok(toml::to_string_pretty(&shown)?)
}

fn apply(config: &mut Config, o: &Overrides) -> Result<()> {
    if let Some(uri) = &o.mongo_uri {
        config.store.uri.clone_from(uri);
    }
    if let Some(host) = &o.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = o.port {
        config.server.port = port;
    }
    if let Some(workers) = o.workers {
        config.server.workers = workers;
    }
    if let Some(origins) = &o.cors_origins {
        config.server.cors_origins = origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
    }
    if let Some(debug) = o.debug {
        config.server.debug = debug;
    }
    if let Some(level) = &o.log_level {
        config.logging.level = level.to_ascii_lowercase();
    }
    if let Some(format) = &o.log_format {
        config.logging.format = format.parse::<LogFormat>()?;
    }
    if let Some(limit) = o.default_limit {
        config.query.default_limit = limit;
    }
    if let Some(skip) = o.default_skip {
        config.query.default_skip = skip;
    }
    if let Some(max) = o.max_limit {
        config.query.max_limit = max;
    }
    if let Some(field) = &o.default_sort_field {
        config.query.default_sort_field.clone_from(field);
    }
    if let Some(order) = o.default_sort_order {
        config.query.default_sort_direction = order;
    }
    Ok(())
}
