// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors
use crate::config::ChamberConfigError;
use config::{Environment, Map, Source, Value, ValueKind};
use log::*;

pub static ENV_PREFIX: &str = "CHAMBER";

/// Snapshot of the `CHAMBER_*` environment variables
///
/// The snapshot is taken once, when the configuration is created, so that
/// reading a setting never looks at the process environment again.
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    map: Map<String, Value>,
}

impl EnvConfig {
    /// Collect the `CHAMBER_*` variables from the process environment
    pub fn new() -> Result<Self, ChamberConfigError> {
        Self::collect_from(Environment::with_prefix(ENV_PREFIX))
    }

    /// Build a snapshot from the given variables instead of the process
    /// environment
    ///
    /// Variables without the `CHAMBER_` prefix are dropped.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ChamberConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self::collect_from(
            Environment::with_prefix(ENV_PREFIX).source(Some(source)),
        )
    }

    fn collect_from(
        env_source: Environment,
    ) -> Result<Self, ChamberConfigError> {
        // Empty variables are kept so that their presence can be checked
        let map = env_source
            .prefix_separator("_")
            .ignore_empty(false)
            .collect()?;

        map.iter()
            .for_each(|(c, v)| debug!("Environment configuration {c}={v}"));

        Ok(EnvConfig { map })
    }

    /// Whether the variable is present, even if set to an empty string
    pub fn contains(&self, var: &str) -> bool {
        option_key(var).is_some_and(|key| self.map.contains_key(&key))
    }

    /// Get the value of the variable
    ///
    /// A variable set to an empty string counts as unset.
    pub fn get(&self, var: &str) -> Option<&Value> {
        let value = self.map.get(&option_key(var)?)?;
        match &value.kind {
            ValueKind::String(s) if s.is_empty() => {
                debug!("Ignoring empty environment variable {var}");
                None
            }
            _ => Some(value),
        }
    }
}

// CHAMBER_KMS_KEY_ALIAS is collected as kms_key_alias
fn option_key(var: &str) -> Option<String> {
    var.to_lowercase()
        .strip_prefix(&format!("{}_", ENV_PREFIX.to_lowercase()))
        .map(str::to_string)
}
