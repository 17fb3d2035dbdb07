//! Configuration file loading and error types.

use std::path::{Path, PathBuf};

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file is missing: {}", .0.display())]
    Missing(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("validation: {0}")]
    Validation(String),
}

/// Load a configuration file.
///
/// `.json` and `.jsonc` files are parsed as JSON (comments allowed);
/// everything else is parsed as TOML.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let data = std::fs::read_to_string(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("toml");
    parse_config(&data, ext)
}

/// Parse configuration text in the format named by `ext`.
pub fn parse_config(data: &str, ext: &str) -> Result<Config, ConfigError> {
    match ext {
        "json" | "jsonc" => {
            let stripped = json_comments::StripComments::new(data.as_bytes());
            Ok(serde_json::from_reader(stripped)?)
        }
        _ => Ok(toml::from_str(data)?),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_is_reported_by_path() {
        let err = load_config("/nonexistent/proxy_config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert!(err.to_string().contains("/nonexistent/proxy_config.toml"));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[proxies.a]\nhost = \"a.example\"\nuser = \"u\"\npassword = \"pw\"\n\n[[filters]]\nurl = \".example.\"\nproxy = \"a\""
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.proxies["a"].host, "a.example");
        assert_eq!(config.filters[0].url, ".example.");
    }

    #[test]
    fn loads_jsonc_with_comments() {
        let text = r#"{
            // endpoints
            "proxies": { "a": { "host": "a", "port": "22", "user": "u" } },
            "filters": [ { "url": "a.", "proxy": "a" } ]
        }"#;
        let config = parse_config(text, "jsonc").unwrap();
        assert_eq!(config.proxies["a"].port, 22);
        assert_eq!(config.filters.len(), 1);
    }

    #[test]
    fn syntax_errors_surface_as_toml_errors() {
        let err = parse_config("[proxies.a\nhost = 1", "toml").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
