use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use basura_core::model::{ThresholdPolicy, WasteUnit};

/// Upload size limit when `BASURA_MAX_UPLOAD_BYTES` is unset.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Policy version recorded for thresholds given as explicit numbers.
pub const CUSTOM_POLICY: &str = "custom";

#[derive(Debug, Clone, PartialEq)]
/// Runtime settings of the HTTP server.
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Backing spreadsheet.
    pub dataset_path: PathBuf,
    /// Model artifact.
    pub model_path: PathBuf,
    /// Cut points used to label training data.
    pub policy: ThresholdPolicy,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            dataset_path: PathBuf::from("dataset.xlsx"),
            model_path: PathBuf::from("waste_model.json"),
            policy: ThresholdPolicy::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set to a value that cannot be used.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for unset keys.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set to a value that cannot be used.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match parsed(&lookup, "BASURA_PORT")? {
            Some(port) => port,
            None => parsed(&lookup, "PORT")?.unwrap_or(defaults.port),
        };

        Ok(Self {
            host: lookup("BASURA_HOST").unwrap_or(defaults.host),
            port,
            dataset_path: lookup("BASURA_DATASET").map_or(defaults.dataset_path, PathBuf::from),
            model_path: lookup("BASURA_MODEL").map_or(defaults.model_path, PathBuf::from),
            policy: policy(&lookup)?,
            max_upload_bytes: parsed(&lookup, "BASURA_MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
        })
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| anyhow!("{key}={raw:?} is invalid: {err}"))
        })
        .transpose()
}

fn unit(raw: &str) -> Result<WasteUnit> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "daily" | "day" => Ok(WasteUnit::Daily),
        "weekly" | "week" => Ok(WasteUnit::Weekly),
        other => bail!("BASURA_WASTE_UNIT={other:?} must be `daily` or `weekly`"),
    }
}

/// Explicit cut points win over a named preset; neither means the default preset.
fn policy<F>(lookup: &F) -> Result<ThresholdPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let low_medium: Option<f64> = parsed(lookup, "BASURA_LOW_MEDIUM")?;
    let medium_high: Option<f64> = parsed(lookup, "BASURA_MEDIUM_HIGH")?;

    match (low_medium, medium_high) {
        (Some(low_medium), Some(medium_high)) => {
            let unit = lookup("BASURA_WASTE_UNIT")
                .map_or(Ok(WasteUnit::Daily), |raw| unit(&raw))?;
            ThresholdPolicy::new(CUSTOM_POLICY, unit, low_medium, medium_high)
                .context("BASURA_LOW_MEDIUM/BASURA_MEDIUM_HIGH")
        }
        (None, None) => match lookup("BASURA_THRESHOLDS") {
            Some(name) => ThresholdPolicy::preset(name.trim()).ok_or_else(|| {
                anyhow!(
                    "BASURA_THRESHOLDS={name:?} is not one of {}",
                    ThresholdPolicy::preset_names().join(", ")
                )
            }),
            None => Ok(ThresholdPolicy::default()),
        },
        _ => bail!("BASURA_LOW_MEDIUM and BASURA_MEDIUM_HIGH must be set together"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config(&[]).expect("defaults are valid");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn basura_port_wins_over_port() {
        assert_eq!(config(&[("PORT", "8080")]).expect("valid").port, 8080);
        assert_eq!(
            config(&[("PORT", "8080"), ("BASURA_PORT", "9000")])
                .expect("valid")
                .port,
            9000
        );
        assert!(config(&[("PORT", "http")]).is_err());
    }

    #[test]
    fn named_preset_is_selected() {
        let weekly = config(&[("BASURA_THRESHOLDS", "weekly-3000-8000")]).expect("valid");
        assert_eq!(weekly.policy.unit, WasteUnit::Weekly);
        assert!((weekly.policy.medium_high - 8000.0).abs() < f64::EPSILON);
        assert!(config(&[("BASURA_THRESHOLDS", "monthly")]).is_err());
    }

    #[test]
    fn explicit_thresholds_build_custom_policy() {
        let config = config(&[
            ("BASURA_LOW_MEDIUM", "100"),
            ("BASURA_MEDIUM_HIGH", "250.5"),
            ("BASURA_WASTE_UNIT", "Weekly"),
        ])
        .expect("valid");
        assert_eq!(config.policy.version, CUSTOM_POLICY);
        assert_eq!(config.policy.unit, WasteUnit::Weekly);
        assert!((config.policy.low_medium - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inconsistent_thresholds_are_rejected() {
        assert!(config(&[("BASURA_LOW_MEDIUM", "100")]).is_err());
        assert!(config(&[("BASURA_LOW_MEDIUM", "700"), ("BASURA_MEDIUM_HIGH", "500")]).is_err());
        assert!(
            config(&[
                ("BASURA_LOW_MEDIUM", "1"),
                ("BASURA_MEDIUM_HIGH", "2"),
                ("BASURA_WASTE_UNIT", "monthly"),
            ])
            .is_err()
        );
    }

    #[test]
    fn paths_and_limits_are_read() {
        let config = config(&[
            ("BASURA_DATASET", "/data/sheet.csv"),
            ("BASURA_MODEL", "/data/model.json"),
            ("BASURA_MAX_UPLOAD_BYTES", "2048"),
            ("BASURA_HOST", "127.0.0.1"),
        ])
        .expect("valid");
        assert_eq!(config.dataset_path, PathBuf::from("/data/sheet.csv"));
        assert_eq!(config.model_path, PathBuf::from("/data/model.json"));
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.host, "127.0.0.1");
    }
}
