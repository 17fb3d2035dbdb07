//! Configuration validation logic.

use std::collections::HashSet;

use sshroute_core::defaults::{MAX_RELAY_BUFFER_SIZE, MIN_RELAY_BUFFER_SIZE};
use tracing::warn;

use crate::Config;
use crate::loader::ConfigError;

/// Check a loaded configuration.
///
/// Hard errors reject the configuration. Problems the router tolerates at
/// runtime (unknown parents, filters naming unknown endpoints, several
/// credential fields on one endpoint) are logged as warnings.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut names: Vec<&String> = config.proxies.keys().collect();
    names.sort();

    for name in &names {
        let proxy = &config.proxies[*name];
        if name.trim().is_empty() {
            return Err(ConfigError::Validation("proxy name is empty".into()));
        }
        if proxy.host.trim().is_empty() {
            return Err(ConfigError::Validation(format!("proxies.{name}.host is empty")));
        }
        if proxy.user.trim().is_empty() {
            return Err(ConfigError::Validation(format!("proxies.{name}.user is empty")));
        }
        if let Some(parent) = proxy.parent_name() {
            if parent == name.as_str() {
                return Err(ConfigError::Validation(format!(
                    "proxies.{name}.parent refers to itself"
                )));
            }
            if !config.proxies.contains_key(parent) {
                warn!(proxy = %name, parent, "parent proxy not defined, connecting directly");
            }
        }
        if proxy.credential_count() > 1 {
            warn!(
                proxy = %name,
                "several credentials configured, using the first of variable, key, password"
            );
        }
    }

    if let Some(cycle) = find_parent_cycle(config, &names) {
        return Err(ConfigError::Validation(format!(
            "proxy parent cycle: {}",
            cycle.join(" -> ")
        )));
    }

    for (i, filter) in config.filters.iter().enumerate() {
        if filter.url.is_empty() {
            warn!(
                index = i,
                proxy = %filter.proxy,
                "filter url is empty and matches every destination"
            );
        }
        if !config.proxies.contains_key(&filter.proxy) {
            warn!(
                url = %filter.url,
                proxy = %filter.proxy,
                "filter refers to an undefined proxy and will never route"
            );
        }
    }

    if !(MIN_RELAY_BUFFER_SIZE..=MAX_RELAY_BUFFER_SIZE).contains(&config.relay.buffer_size) {
        return Err(ConfigError::Validation(format!(
            "relay.buffer_size must be {MIN_RELAY_BUFFER_SIZE}..={MAX_RELAY_BUFFER_SIZE}"
        )));
    }

    Ok(())
}

/// Follow parent links from every proxy; return the first loop found.
fn find_parent_cycle(config: &Config, names: &[&String]) -> Option<Vec<String>> {
    let mut cleared: HashSet<&str> = HashSet::new();

    for start in names {
        let mut path: Vec<&str> = Vec::new();
        let mut current = Some(start.as_str());

        while let Some(name) = current {
            if cleared.contains(name) {
                break;
            }
            if let Some(pos) = path.iter().position(|n| *n == name) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(name.to_string());
                return Some(cycle);
            }
            path.push(name);
            current = config
                .proxies
                .get(name)
                .and_then(|p| p.parent_name())
                .filter(|parent| config.proxies.contains_key(*parent));
        }

        cleared.extend(path);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn accepts_chain() {
        let config = parse(
            r#"
[proxies.a]
host = "a"
user = "u"

[proxies.b]
host = "b"
user = "u"
parent = "a"

[proxies.c]
host = "c"
user = "u"
parent = "b"

[[filters]]
url = ".corp."
proxy = "c"
"#,
        );
        validate_config(&config).unwrap();
    }

    #[test]
    fn rejects_empty_host() {
        let config = parse("[proxies.a]\nhost = \" \"\nuser = \"u\"\n");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("proxies.a.host"));
    }

    #[test]
    fn rejects_parent_cycle() {
        let config = parse(
            r#"
[proxies.a]
host = "a"
user = "u"
parent = "c"

[proxies.b]
host = "b"
user = "u"
parent = "a"

[proxies.c]
host = "c"
user = "u"
parent = "b"
"#,
        );
        let err = validate_config(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cycle"), "{msg}");
        for name in ["a", "b", "c"] {
            assert!(msg.contains(name), "{msg}");
        }
    }

    #[test]
    fn rejects_self_parent() {
        let config = parse("[proxies.a]\nhost = \"a\"\nuser = \"u\"\nparent = \"a\"\n");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn unknown_parent_and_target_are_warnings() {
        let config = parse(
            r#"
[proxies.a]
host = "a"
user = "u"
parent = "ghost"

[[filters]]
url = "x."
proxy = "missing"
"#,
        );
        validate_config(&config).unwrap();
    }

    #[test]
    fn empty_filter_url_is_a_catch_all() {
        let config = parse(
            r#"
[proxies.a]
host = "a"
user = "u"

[[filters]]
url = ""
proxy = "a"
"#,
        );
        validate_config(&config).unwrap();
    }

    #[test]
    fn zero_relay_idle_timeout_disables_it() {
        let config = parse("[relay]\nidle_timeout_secs = 0\n");
        validate_config(&config).unwrap();
        assert_eq!(Config::default().relay.idle_timeout_secs, 0);
    }

    #[test]
    fn missing_user_is_a_validation_error() {
        let config = parse("[proxies.a]\nhost = \"a\"\n");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("proxies.a.user is empty"), "{err}");
    }

    #[test]
    fn rejects_bad_relay_buffer() {
        let config = parse("[relay]\nbuffer_size = 16\n");
        assert!(validate_config(&config).is_err());
    }
}
