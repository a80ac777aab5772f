use std::{env, path::Path};

use config::{Config as ConfigBuilder, File, FileFormat};
use eyre::{Context, Result, eyre};

use crate::config::{models::Config, validation::ConfigValidator};

/// Environment variable naming the configuration file.
pub const ENV_CONFIG_PATH: &str = "API_AGGREGATOR_CONFIG_PATH";

const ENV_PORT: &str = "API_AGGREGATOR_PORT";
const ENV_LOG_LEVEL: &str = "API_AGGREGATOR_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "API_AGGREGATOR_LOG_FORMAT";
const ENV_TRACING_ENABLED: &str = "API_AGGREGATOR_TRACING_ENABLED";
const ENV_TRACING_ENDPOINT: &str = "API_AGGREGATOR_TRACING_ENDPOINT";
const ENV_METRICS_ENABLED: &str = "API_AGGREGATOR_METRICS_ENABLED";
const ENV_SERVICE_NAME: &str = "API_AGGREGATOR_SERVICE_NAME";

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Resolve the configuration path: environment override first, then the
/// supplied fallback (usually the CLI flag).
pub fn resolve_config_path(fallback: &str) -> String {
    match env::var(ENV_CONFIG_PATH) {
        Ok(path) if !path.is_empty() => path,
        _ => {
            if fallback.is_empty() {
                DEFAULT_CONFIG_PATH.to_string()
            } else {
                fallback.to_string()
            }
        }
    }
}

/// Load configuration from a file using the config crate.
/// Supports multiple formats by extension; defaults to YAML.
pub fn load_config(config_path: &str) -> Result<Config> {
    let path = Path::new(config_path);

    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Yaml,
    };

    let settings = ConfigBuilder::builder()
        .add_source(File::new(
            path.to_str()
                .ok_or_else(|| eyre!("Invalid UTF-8 path: {}", path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let mut cfg: Config = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            path.display()
        )
    })?;

    cfg.apply_defaults();

    ConfigValidator::validate(&cfg)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(cfg)
}

/// Load configuration honoring the `API_AGGREGATOR_*` environment overrides.
/// Overrides are applied after the file is loaded, matching the documented
/// precedence: file < environment.
pub fn load_config_from_env(fallback_path: &str) -> Result<Config> {
    let config_path = resolve_config_path(fallback_path);
    let mut cfg = load_config(&config_path)?;
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut Config) -> Result<()> {
    if let Ok(port) = env::var(ENV_PORT) {
        if !port.is_empty() {
            cfg.port = port;
        }
    }
    if let Ok(level) = env::var(ENV_LOG_LEVEL) {
        if !level.is_empty() {
            cfg.log_level = level;
        }
    }
    if let Ok(format) = env::var(ENV_LOG_FORMAT) {
        if !format.is_empty() {
            cfg.log_format = crate::config::models::LogFormat::parse_lenient(&format);
        }
    }
    if let Ok(enabled) = env::var(ENV_TRACING_ENABLED) {
        if !enabled.is_empty() {
            cfg.tracing_enabled = parse_bool(ENV_TRACING_ENABLED, &enabled)?;
        }
    }
    if let Ok(endpoint) = env::var(ENV_TRACING_ENDPOINT) {
        if !endpoint.is_empty() {
            cfg.tracing_endpoint = endpoint;
        }
    }
    if let Ok(enabled) = env::var(ENV_METRICS_ENABLED) {
        if !enabled.is_empty() {
            cfg.metrics_enabled = parse_bool(ENV_METRICS_ENABLED, &enabled)?;
        }
    }
    if let Ok(name) = env::var(ENV_SERVICE_NAME) {
        if !name.is_empty() {
            cfg.service_name = name;
        }
    }
    Ok(())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .with_context(|| format!("Failed to parse {name} as boolean: {value}"))
}
