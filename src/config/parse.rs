use super::types::WorkerConfig;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// A century of monthly indices.
pub const MAX_RETENTION_MONTHS: i64 = 1200;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<WorkerConfig, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parses and validates a config document.
pub fn parse_config(yaml: &str) -> Result<WorkerConfig, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: WorkerConfig = serde_yaml::from_str(&yaml_string)?;

    for path in config.logs.iter_mut() {
        *path = expand_tilde(path);
    }

    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "environment variables are not set: {}",
        unexpanded_vars.join(", ")
    )))
}

fn validate_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.project.trim().is_empty() {
        errors.push("project cannot be empty".to_string());
    }

    if config.logs.is_empty() {
        errors.push("logs must list at least one file".to_string());
    }
    for (i, path) in config.logs.iter().enumerate() {
        if path.as_os_str().is_empty() {
            errors.push(format!("logs[{}]: path cannot be empty", i));
        }
    }

    if config.es_host.trim().is_empty() {
        errors.push("es_host cannot be empty".to_string());
    } else if !(config.es_host.starts_with("http://") || config.es_host.starts_with("https://")) {
        errors.push(format!(
            "es_host '{}' must start with http:// or https://",
            config.es_host
        ));
    }

    if config.es_index_prefix.trim().is_empty() {
        errors.push("es_index_prefix cannot be empty".to_string());
    }

    for (i, suffix) in config.exclude.iter().enumerate() {
        if suffix.is_empty() {
            // An empty suffix would match every line
            errors.push(format!("exclude[{}]: entry cannot be empty", i));
        }
    }

    let tuning = &config.tuning;
    if tuning.retention_months <= 0 || tuning.retention_months > MAX_RETENTION_MONTHS {
        errors.push(format!(
            "tuning.retention_months must be between 1 and {}, got {}",
            MAX_RETENTION_MONTHS, tuning.retention_months
        ));
    }
    if tuning.resume_cutoff_hour > 23 {
        errors.push(format!(
            "tuning.resume_cutoff_hour must be between 0 and 23, got {}",
            tuning.resume_cutoff_hour
        ));
    }
    if tuning.poll_interval.is_zero() {
        errors.push("tuning.poll_interval must be greater than zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINIMAL: &str = r#"
project: nginx
logs:
  - /var/log/nginx/access.log
es_host: http://127.0.0.1:9200
es_index_prefix: nginx-access-
hostname: web-01
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.project, "nginx");
        assert_eq!(config.hostname, "web-01");
        assert!(config.exclude.is_empty());
        assert_eq!(config.tuning.retention_months, 3);
        assert_eq!(config.tuning.resume_cutoff_hour, 5);
        assert_eq!(config.tuning.cycle_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_missing_required_field() {
        let yaml = "project: nginx\nlogs: [/tmp/a.log]\nes_host: http://localhost:9200\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse(_)));
        assert!(err.to_string().contains("es_index_prefix"));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let yaml = r#"
project: ""
logs: []
es_host: "localhost:9200"
es_index_prefix: ""
exclude: [""]
tuning:
  resume_cutoff_hour: 24
  retention_months: 0
"#;
        match parse_config(yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 7, "{:?}", errors);
                assert!(errors.iter().any(|e| e.contains("project")));
                assert!(errors.iter().any(|e| e.contains("http://")));
                assert!(errors.iter().any(|e| e.contains("resume_cutoff_hour")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_retention_months_is_bounded() {
        for (months, ok) in [(1, true), (1200, true), (1201, false), (i64::MAX, false), (-3, false)] {
            let yaml = format!("{}tuning:\n  retention_months: {}\n", MINIMAL, months);
            match parse_config(&yaml) {
                Ok(config) => {
                    assert!(ok, "{} should be rejected", months);
                    assert_eq!(config.tuning.retention_months, months);
                }
                Err(ConfigError::ValidationList(errors)) => {
                    assert!(!ok, "{} should be accepted: {:?}", months, errors);
                    assert!(errors[0].contains("retention_months"));
                }
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let yaml = MINIMAL.replace("web-01", "$env{LOGSHIP_SURELY_UNSET_VAR}");
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("LOGSHIP_SURELY_UNSET_VAR"));
    }
}
