// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

//! Layer registry
//!
//! Every setting is declared once with an optional default and an optional
//! environment binding. Flags and merged override values are attached
//! afterwards. Reading a setting walks the layers in this order, highest
//! priority first:
//!
//! 1. Merged override configuration
//! 2. Flags changed on the command line
//! 3. Environment variables
//! 4. Values of flags that were bound but not changed
//! 5. Declared defaults

use crate::config::{ChamberConfigError, EnvConfig};
use config::{Map, Value, ValueKind};
use log::*;
use std::collections::BTreeMap;

/// Where a setting reads its environment value from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvBinding {
    /// Not bound to the environment
    None,
    /// Bound to a single variable
    Single(&'static str),
    /// Bound to `preferred` if it is present in the environment, otherwise
    /// to `fallback`
    Preferred {
        preferred: &'static str,
        fallback: &'static str,
    },
}

impl EnvBinding {
    /// Choose the variable to bind to
    ///
    /// A preferred variable set to an empty string is still present, so it
    /// wins over the fallback.
    pub fn select(&self, env: &EnvConfig) -> Option<&'static str> {
        match *self {
            EnvBinding::None => None,
            EnvBinding::Single(var) => Some(var),
            EnvBinding::Preferred {
                preferred,
                fallback,
            } => {
                if env.contains(preferred) {
                    Some(preferred)
                } else {
                    Some(fallback)
                }
            }
        }
    }
}

/// A flag value parsed by the command line layer
#[derive(Clone, Debug)]
pub struct Flag {
    value: Value,
    changed: bool,
}

impl Flag {
    /// A flag the user set on the command line
    pub fn changed(value: impl Into<Value>) -> Self {
        Flag {
            value: value.into(),
            changed: true,
        }
    }

    /// A flag that kept its own default
    pub fn unchanged(value: impl Into<Value>) -> Self {
        Flag {
            value: value.into(),
            changed: false,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }
}

#[derive(Clone, Debug)]
struct Setting {
    default: Option<Value>,
    env_var: Option<&'static str>,
    env_value: Option<Value>,
    flag: Option<Flag>,
}

impl Setting {
    fn resolve(&self) -> Option<&Value> {
        if let Some(flag) = self.flag.as_ref().filter(|f| f.changed) {
            return Some(&flag.value);
        }
        if let Some(value) = &self.env_value {
            return Some(value);
        }
        if let Some(flag) = &self.flag {
            return Some(&flag.value);
        }
        self.default.as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    settings: BTreeMap<String, Setting>,
    overrides: BTreeMap<String, Value>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a setting
    ///
    /// The environment binding is resolved here, against the given snapshot,
    /// and never again.
    ///
    /// # Arguments
    ///
    /// * `name` - Setting name, matched case-insensitively
    /// * `default` - Value used when no other layer sets the option
    /// * `env` - Environment binding
    /// * `env_config` - Environment snapshot
    ///
    /// # Errors
    ///
    /// Returns `ChamberConfigError::AlreadyDeclared` if `name` was declared
    /// before.
    pub fn declare(
        &mut self,
        name: &str,
        default: Option<Value>,
        env: EnvBinding,
        env_config: &EnvConfig,
    ) -> Result<(), ChamberConfigError> {
        let key = name.to_lowercase();
        if self.settings.contains_key(&key) {
            return Err(ChamberConfigError::AlreadyDeclared(key));
        }

        let env_var = env.select(env_config);
        if let Some(var) = env_var {
            debug!("Configuration option {key} bound to {var}");
        }
        let env_value = env_var
            .and_then(|var| env_config.get(var))
            .cloned();

        _ = self.settings.insert(
            key,
            Setting {
                default,
                env_var,
                env_value,
                flag: None,
            },
        );
        Ok(())
    }

    /// Use a parsed flag as a source for `name`
    ///
    /// Binding again replaces the previous flag.
    ///
    /// # Errors
    ///
    /// Returns `ChamberConfigError::UnknownSetting` if `name` was never
    /// declared.
    pub fn bind_flag(
        &mut self,
        name: &str,
        flag: Flag,
    ) -> Result<(), ChamberConfigError> {
        let key = name.to_lowercase();
        let setting = self
            .settings
            .get_mut(&key)
            .ok_or_else(|| ChamberConfigError::UnknownSetting(key.clone()))?;

        debug!(
            "Configuration option {key} bound to flag (changed: {})",
            flag.changed
        );
        setting.flag = Some(flag);
        Ok(())
    }

    /// Write decoded override values on top of every other layer
    ///
    /// Existing override values for the same keys are replaced; keys not in
    /// `values` keep whatever they had.
    pub fn merge(&mut self, values: Map<String, Value>) {
        for (key, value) in values {
            let key = key.to_lowercase();
            debug!("Merging configuration option {key}={value}");
            _ = self.overrides.insert(key, value);
        }
    }

    /// The effective value of `name`, or `None` if no layer sets it
    ///
    /// A merged `null` does not count as set.
    pub fn resolve(&self, name: &str) -> Option<&Value> {
        let key = name.to_lowercase();
        if let Some(value) = self.overrides.get(&key).filter(|v| !is_nil(v))
        {
            return Some(value);
        }
        self.settings.get(&key).and_then(Setting::resolve)
    }

    /// Whether any layer sets `name`
    pub fn is_set(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Whether `name` was declared
    pub fn is_declared(&self, name: &str) -> bool {
        self.settings.contains_key(&name.to_lowercase())
    }

    /// The environment variable `name` is bound to, if any
    pub fn env_var(&self, name: &str) -> Option<&'static str> {
        self.settings
            .get(&name.to_lowercase())
            .and_then(|s| s.env_var)
    }

    /// The declared default of `name`, if it has one
    pub fn default_value(&self, name: &str) -> Option<&Value> {
        self.settings
            .get(&name.to_lowercase())
            .and_then(|s| s.default.as_ref())
    }

    /// Every option that is set, sorted by name
    ///
    /// Merged keys that were never declared are included.
    pub fn all_settings(&self) -> BTreeMap<String, Value> {
        let mut all: BTreeMap<String, Value> = self
            .settings
            .iter()
            .filter_map(|(k, s)| s.resolve().map(|v| (k.clone(), v.clone())))
            .collect();

        for (k, v) in self.overrides.iter().filter(|(_, v)| !is_nil(v)) {
            _ = all.insert(k.clone(), v.clone());
        }

        all
    }
}

fn is_nil(value: &Value) -> bool {
    matches!(value.kind, ValueKind::Nil)
}
