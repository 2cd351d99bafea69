// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::value::Value;

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use log::warn;
use serde::Deserialize;

/// Evaluator configuration read from YAML.
///
/// ```yaml
/// globals:
///   limit: 10
/// regexp:
///   foo: "foo(.)"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub globals: BTreeMap<String, Value>,

    #[serde(default)]
    pub regexp: BTreeMap<String, String>,

    /// Schemas for XML decoding, keyed by name. Accepted but not used.
    #[serde(default)]
    pub xsd: BTreeMap<String, String>,

    /// WebAssembly modules, keyed by name. Accepted but not used.
    #[serde(default)]
    pub wasm: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// HTTP client credentials. At most one method may be configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub basic: Option<BasicAuth>,
    pub oauth2: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicAuth {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {path}"))?;
        Self::from_yaml_str(&yaml).with_context(|| format!("invalid config {path}"))
    }

    fn validate(&self) -> Result<()> {
        if !self.xsd.is_empty() {
            warn!("xml support is not available; ignoring {} xsd entries", self.xsd.len());
        }
        if !self.wasm.is_empty() {
            warn!("wasm support is not available; ignoring {} modules", self.wasm.len());
        }
        if let Some(auth) = &self.auth {
            if auth.basic.is_some() && auth.oauth2.is_some() {
                bail!("configured basic authentication and OAuth2");
            }
            warn!("http support is not available; ignoring auth");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_and_patterns() {
        let cfg = Config::from_yaml_str(
            r#"
globals:
  limit: 10
  names: [a, b]
regexp:
  foo: "foo(.)"
"#,
        )
        .unwrap();
        assert_eq!(cfg.globals["limit"], Value::Int(10));
        assert_eq!(cfg.globals["names"], Value::from_json_str(r#"["a","b"]"#).unwrap());
        assert_eq!(cfg.regexp["foo"], "foo(.)");
    }

    #[test]
    fn conflicting_auth() {
        let err = Config::from_yaml_str(
            r#"
auth:
  basic:
    user: u
    password: p
  oauth2:
    provider: google
"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "configured basic authentication and OAuth2");
    }

    #[test]
    fn empty_document() {
        let cfg = Config::from_yaml_str("{}").unwrap();
        assert!(cfg.globals.is_empty() && cfg.auth.is_none());
    }
}
