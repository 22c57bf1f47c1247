use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderflow_core::config::{
    AppConfig, ConfigOverrides, LoadOptions, CONFIG_FILE_NAME, NESTED_CONFIG_FILE,
};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

struct FieldSpec {
    key: &'static str,
    env_keys: &'static [&'static str],
    overridden: fn(&ConfigOverrides) -> bool,
    render: fn(&AppConfig) -> String,
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "database.url",
        env_keys: &["ORDERFLOW_DATABASE_URL"],
        overridden: |o| o.database_url.is_some(),
        render: |c| c.database.url.clone(),
    },
    FieldSpec {
        key: "database.max_connections",
        env_keys: &["ORDERFLOW_DATABASE_MAX_CONNECTIONS"],
        overridden: |_| false,
        render: |c| c.database.max_connections.to_string(),
    },
    FieldSpec {
        key: "database.timeout_secs",
        env_keys: &["ORDERFLOW_DATABASE_TIMEOUT_SECS"],
        overridden: |_| false,
        render: |c| c.database.timeout_secs.to_string(),
    },
    FieldSpec {
        key: "logging.level",
        env_keys: &["ORDERFLOW_LOGGING_LEVEL", "ORDERFLOW_LOG_LEVEL"],
        overridden: |o| o.log_level.is_some(),
        render: |c| c.logging.level.clone(),
    },
    FieldSpec {
        key: "logging.format",
        env_keys: &["ORDERFLOW_LOGGING_FORMAT", "ORDERFLOW_LOG_FORMAT"],
        overridden: |o| o.log_format.is_some(),
        render: |c| format!("{:?}", c.logging.format).to_ascii_lowercase(),
    },
    FieldSpec {
        key: "workflow.max_conflict_retries",
        env_keys: &["ORDERFLOW_WORKFLOW_MAX_CONFLICT_RETRIES"],
        overridden: |o| o.max_conflict_retries.is_some(),
        render: |c| c.workflow.max_conflict_retries.to_string(),
    },
];

/// Effective configuration with the layer each value came from.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<ConfigEntry> = FIELDS
        .iter()
        .map(|field| ConfigEntry {
            key: field.key,
            value: (field.render)(&config),
            source: field_source(
                field,
                &options.overrides,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect();

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: override > env > file > default)",
        &entries,
    )
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &FieldSpec,
    overrides: &ConfigOverrides,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if (field.overridden)(overrides) {
        return "override".to_string();
    }

    let env_key = field
        .env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
