use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::files;

pub const CONFIG_FILE: &str = "config.json";
pub const CERT_DIR: &str = "cert";

static LISTEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)^[.0-9|\w]*:[0-9]{1,5}$").expect("static regex"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)^[\w-]+$").expect("static regex"));
static FULL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)^[\w -]+$").expect("static regex"));

/// `host:port`, `:port`, `0.0.0.0:port` ...
pub fn validate_listen(value: &str) -> bool {
    LISTEN_RE.is_match(value)
}

/// Service name, also the key/cert file prefix: letters, digits, `_` and `-`
pub fn validate_service_name(value: &str) -> bool {
    NAME_RE.is_match(value)
}

/// Human readable service name: like a service name, spaces allowed
pub fn validate_full_name(value: &str) -> bool {
    FULL_NAME_RE.is_match(value)
}

/// Signing service configuration, persisted as `config.json`
///
/// # Environment
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PKI_WORK_DIR | directory of the executable | holds `config.json` and `cert/` |
/// | PKI_LOG_LEVEL | info | tracing level |
/// | PKI_LOG_DIR | (none) | daily rolling log files |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Listen address, `host:port`
    #[serde(rename = "listen", default)]
    pub listen: String,
    /// Service identity; selects `<name>-ca.key` / `<name>-ca.crt`
    #[serde(rename = "servicename", default)]
    pub service_name: String,
    #[serde(rename = "servicefullname", default)]
    pub service_full_name: String,
    /// Per-frame read deadline. Absent means wait for the peer indefinitely.
    #[serde(
        rename = "readtimeoutsecs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub read_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write atomically with owner-only permissions
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        files::write_private(path, &data).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check("listen", &self.listen, validate_listen)?;
        check("servicename", &self.service_name, validate_service_name)?;
        check("servicefullname", &self.service_full_name, validate_full_name)?;
        Ok(())
    }

    /// Combine a stored config with operator-supplied values.
    ///
    /// A non-empty supplied value must be valid and replaces the stored one.
    /// An empty supplied value keeps the stored one, which must exist.
    /// Returns the merged config and whether it differs from what is stored.
    pub fn merge(
        stored: Option<&Config>,
        listen: &str,
        name: &str,
        full_name: &str,
    ) -> Result<(Config, bool), ConfigError> {
        let mut config = stored.cloned().unwrap_or_default();
        let mut changed = stored.is_none();

        changed |= merge_field("listen", &mut config.listen, listen, validate_listen)?;
        changed |= merge_field(
            "servicename",
            &mut config.service_name,
            name,
            validate_service_name,
        )?;
        changed |= merge_field(
            "servicefullname",
            &mut config.service_full_name,
            full_name,
            validate_full_name,
        )?;

        Ok((config, changed))
    }

    /// Address handed to the socket layer. A bare `:port` means all interfaces.
    pub fn bind_address(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}

fn check(field: &'static str, value: &str, valid: fn(&str) -> bool) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing(field));
    }
    if !valid(value) {
        return Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn merge_field(
    field: &'static str,
    current: &mut String,
    supplied: &str,
    valid: fn(&str) -> bool,
) -> Result<bool, ConfigError> {
    if supplied.is_empty() {
        check(field, current, valid)?;
        return Ok(false);
    }
    check(field, supplied, valid)?;
    if supplied == current {
        return Ok(false);
    }
    *current = supplied.to_string();
    Ok(true)
}

/// Directory holding `config.json` and the `cert/` folder
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `PKI_WORK_DIR`, or the directory containing the running executable
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(dir) = std::env::var("PKI_WORK_DIR")
            && !dir.is_empty()
        {
            return Ok(Self::new(dir));
        }
        let exe = std::env::current_exe().map_err(|e| ConfigError::WorkDir(e.to_string()))?;
        let dir = exe
            .parent()
            .ok_or_else(|| ConfigError::WorkDir(format!("{} has no parent", exe.display())))?;
        Ok(Self::new(dir))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn cert_dir(&self) -> PathBuf {
        self.root.join(CERT_DIR)
    }

    pub fn load_config(&self) -> Result<Config, ConfigError> {
        Config::load(&self.config_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            listen: "localhost:5010".into(),
            service_name: "crab-pki".into(),
            service_full_name: "Crab PKI service".into(),
            read_timeout_secs: None,
        }
    }

    #[test]
    fn test_listen_patterns() {
        for ok in [":5010", "0.0.0.0:5100", "localhost:7800", "name.domain:2000"] {
            assert!(validate_listen(ok), "{ok} should be accepted");
        }
        for bad in ["5010", "localhost", "host:port", "host:123456", "a b:1", "[::1]:80"] {
            assert!(!validate_listen(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_name_patterns() {
        assert!(validate_service_name("myPKI-p5010"));
        assert!(validate_service_name("api_pki"));
        assert!(!validate_service_name("my pki"));
        assert!(!validate_service_name(""));
        assert!(!validate_service_name("pki/../x"));

        assert!(validate_full_name("Api PKI for UAT"));
        assert!(!validate_full_name("pki!"));
        assert!(!validate_full_name("é"));
    }

    #[test]
    fn test_merge_fresh_requires_all_fields() {
        let err = Config::merge(None, "localhost:5010", "crab-pki", "").unwrap_err();
        assert!(matches!(err, ConfigError::Missing("servicefullname")));

        let (config, changed) =
            Config::merge(None, "localhost:5010", "crab-pki", "Crab PKI service").unwrap();
        assert!(changed);
        assert_eq!(config, sample());
    }

    #[test]
    fn test_merge_keeps_stored_values() {
        let stored = sample();
        let (config, changed) = Config::merge(Some(&stored), "", "", "").unwrap();
        assert!(!changed);
        assert_eq!(config, stored);

        let (config, changed) =
            Config::merge(Some(&stored), "localhost:5010", "crab-pki", "").unwrap();
        assert!(!changed);
        assert_eq!(config, stored);
    }

    #[test]
    fn test_merge_replaces_changed_values() {
        let stored = sample();
        let (config, changed) = Config::merge(Some(&stored), ":6000", "", "").unwrap();
        assert!(changed);
        assert_eq!(config.listen, ":6000");
        assert_eq!(config.service_name, stored.service_name);
    }

    #[test]
    fn test_merge_rejects_bad_value() {
        let stored = sample();
        let err = Config::merge(Some(&stored), "", "bad name", "").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "servicename", .. }));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["listen"], "localhost:5010");
        assert_eq!(json["servicename"], "crab-pki");
        assert_eq!(json["servicefullname"], "Crab PKI service");
        assert!(json.get("readtimeoutsecs").is_none());

        let parsed: Config = serde_json::from_str(
            r#"{"listen":":5010","servicename":"a","servicefullname":"b","readtimeoutsecs":30}"#,
        )
        .unwrap();
        assert_eq!(parsed.read_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = WorkDir::new(dir.path());

        assert!(matches!(
            work_dir.load_config().unwrap_err(),
            ConfigError::NotFound(_)
        ));

        sample().save(&work_dir.config_path()).unwrap();
        assert_eq!(work_dir.load_config().unwrap(), sample());
    }

    #[test]
    fn test_bind_address() {
        let mut config = sample();
        assert_eq!(config.bind_address(), "localhost:5010");
        config.listen = ":5010".into();
        assert_eq!(config.bind_address(), "0.0.0.0:5010");
    }
}
