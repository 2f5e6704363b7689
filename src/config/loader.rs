//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::BundleConfig;
use super::secret::secret_string;
use crate::domain::errors::BundleError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into BundleConfig
/// 4. Applies environment variable overrides (PHOTOBUNDLE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `BundleError::Configuration` if the file cannot be read, a
/// referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use photobundle::config::loader::load_config;
///
/// let config = load_config("photobundle.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<BundleConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BundleError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        BundleError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Parses, overrides and validates configuration from TOML text
pub fn load_config_str(contents: &str) -> Result<BundleConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: BundleConfig = toml::from_str(&contents)
        .map_err(|e| BundleError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        BundleError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
pub(crate) fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BundleError::Other(format!("invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(BundleError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        BundleError::Configuration(format!("Invalid value '{value}' for environment variable {name}"))
    })
}

/// Applies environment variable overrides using PHOTOBUNDLE_* prefix
///
/// Variables follow the pattern `PHOTOBUNDLE_<SECTION>_<KEY>`, for example
/// `PHOTOBUNDLE_STORAGE_BASE_URL` or `PHOTOBUNDLE_EXPORT_MAX_CONCURRENCY`.
/// A variable that is set but cannot be parsed is a configuration error.
fn apply_env_overrides(config: &mut BundleConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("PHOTOBUNDLE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Storage overrides
    if let Ok(val) = std::env::var("PHOTOBUNDLE_STORAGE_BASE_URL") {
        config.storage.base_url = val;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_STORAGE_API_KEY") {
        config.storage.api_key = secret_string(val);
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_STORAGE_BUCKET") {
        config.storage.bucket = val;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_STORAGE_TABLE") {
        config.storage.table = val;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_STORAGE_TIMEOUT_SECONDS") {
        config.storage.timeout_seconds =
            parse_override("PHOTOBUNDLE_STORAGE_TIMEOUT_SECONDS", &val)?;
    }

    // Export overrides
    if let Ok(val) = std::env::var("PHOTOBUNDLE_EXPORT_MAX_CONCURRENCY") {
        config.export.max_concurrency =
            parse_override("PHOTOBUNDLE_EXPORT_MAX_CONCURRENCY", &val)?;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_EXPORT_READ_TIMEOUT_MS") {
        config.export.read_timeout_ms =
            parse_override("PHOTOBUNDLE_EXPORT_READ_TIMEOUT_MS", &val)?;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_EXPORT_STRATEGY") {
        config.export.strategy = val
            .parse()
            .map_err(BundleError::Configuration)?;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_EXPORT_COMPRESSION_LEVEL") {
        config.export.compression_level =
            parse_override("PHOTOBUNDLE_EXPORT_COMPRESSION_LEVEL", &val)?;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_EXPORT_MAX_RETRIES") {
        config.export.max_retries = parse_override("PHOTOBUNDLE_EXPORT_MAX_RETRIES", &val)?;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_EXPORT_ARCHIVE_NAME_PREFIX") {
        config.export.archive_name_prefix = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("PHOTOBUNDLE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("PHOTOBUNDLE_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("PHOTOBUNDLE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("PB_LOADER_TEST_VAR", "test_value");
        let input = "api_key = \"${PB_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "api_key = \"test_value\"");
        std::env::remove_var("PB_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("PB_LOADER_MISSING_VAR");
        let input = "api_key = \"${PB_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("PB_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# api_key = \"${PB_LOADER_COMMENTED_OUT}\"\nbucket = \"photos\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-photobundle.toml");
        assert!(matches!(result, Err(BundleError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[storage]
base_url = "https://project.supabase.co"
api_key = "service-key"
bucket = "event-photos"

[export]
max_concurrency = 4
strategy = "barrier"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.storage.base_url, "https://project.supabase.co");
        assert_eq!(config.storage.bucket, "event-photos");
        assert_eq!(config.storage.table, "photos");
        assert_eq!(config.export.max_concurrency, 4);
        assert_eq!(
            config.export.strategy,
            crate::config::FetchStrategy::Barrier
        );
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let toml_content = r#"
[storage]
base_url = "ftp://project.supabase.co"
api_key = "service-key"
"#;
        let err = load_config_str(toml_content).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
    }
}
