// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

//! Typed access to the chamber configuration
//!
//! [`Config`] declares the known options with their defaults and
//! environment bindings, and hides the layering behind one accessor per
//! option. Options declared with a default are required: if one of them
//! cannot be read, the configuration was wired wrongly and the accessor
//! panics instead of returning an error.
//!
//! | Option             | Environment                                                 | Default                     |
//! |--------------------|-------------------------------------------------------------|-----------------------------|
//! | `base`             | `CHAMBER_BASE`                                              |                             |
//! | `kms-key`          | `CHAMBER_KMS_KEY` if present, else `CHAMBER_KMS_KEY_ALIAS`  | `alias/parameter_store_key` |
//! | `aws-region`       | `CHAMBER_AWS_REGION`                                        |                             |
//! | `use-paths`        | `CHAMBER_USE_PATHS`                                         | `false`                     |
//! | `skip-base-config` | `CHAMBER_SKIP_BASE_CONFIG`                                  | `false`                     |
//! | `retries`          | `CHAMBER_RETRIES`                                           | `10`                        |

use crate::config::{
    decode, ChamberConfigError, EnvBinding, EnvConfig, Flag, Registry,
};
use config::{Value, ValueKind};
use log::*;
use regex_lite::Regex;
use serde_json::Value as JsonValue;
use std::{collections::BTreeMap, fmt, sync::OnceLock};

pub const CONFIG_BASE: &str = "base";
pub const CONFIG_KMS_KEY: &str = "kms-key";
pub const CONFIG_AWS_REGION: &str = "aws-region";
pub const CONFIG_USE_PATHS: &str = "use-paths";
pub const CONFIG_SKIP_BASE_CONFIG: &str = "skip-base-config";
pub const CONFIG_RETRIES: &str = "retries";

pub const ENV_BASE: &str = "CHAMBER_BASE";
pub const ENV_KMS_KEY: &str = "CHAMBER_KMS_KEY";
pub const ENV_KMS_KEY_ALIAS: &str = "CHAMBER_KMS_KEY_ALIAS";
pub const ENV_AWS_REGION: &str = "CHAMBER_AWS_REGION";
pub const ENV_USE_PATHS: &str = "CHAMBER_USE_PATHS";
pub const ENV_SKIP_BASE_CONFIG: &str = "CHAMBER_SKIP_BASE_CONFIG";
pub const ENV_RETRIES: &str = "CHAMBER_RETRIES";

pub const DEFAULT_KMS_KEY: &str = "alias/parameter_store_key";
pub const DEFAULT_USE_PATHS: bool = false;
pub const DEFAULT_SKIP_BASE_CONFIG: bool = false;
pub const DEFAULT_RETRIES: i64 = 10;

pub const KMS_ARN_PREFIX: &str = "arn:aws:kms:";
pub const KMS_ALIAS_PREFIX: &str = "alias/";

// KMS key IDs look like RFC 4122 UUIDs
static KMS_KEY_ID: OnceLock<Regex> = OnceLock::new();

fn looks_like_kms_key_id(key: &str) -> bool {
    KMS_KEY_ID
        .get_or_init(|| {
            Regex::new(
                "^[A-Za-z0-9]{8}-[A-Za-z0-9]{4}-[A-Za-z0-9]{4}-[A-Za-z0-9]{4}-[A-Za-z0-9]{12}$",
            )
            .expect("KMS key ID pattern must compile")
        })
        .is_match(key)
}

/// Turn a KMS key setting into the form the backend expects
///
/// Full ARNs and bare key IDs are returned unchanged. Anything else is an
/// alias name and gets the `alias/` prefix if it does not have it yet.
pub fn normalize_kms_key(key: &str) -> String {
    if key.starts_with(KMS_ARN_PREFIX) || looks_like_kms_key_id(key) {
        key.to_string()
    } else if !key.starts_with(KMS_ALIAS_PREFIX) {
        format!("{KMS_ALIAS_PREFIX}{key}")
    } else {
        key.to_string()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    registry: Registry,
}

impl Config {
    /// Create the configuration from the process environment
    ///
    /// # Errors
    ///
    /// Fails if the environment cannot be collected or an option is declared
    /// twice.
    pub fn new() -> Result<Self, ChamberConfigError> {
        Self::with_env(&EnvConfig::new()?)
    }

    /// Create the configuration from an environment snapshot
    pub fn with_env(env: &EnvConfig) -> Result<Self, ChamberConfigError> {
        let mut registry = Registry::new();

        registry.declare(
            CONFIG_BASE,
            None,
            EnvBinding::Single(ENV_BASE),
            env,
        )?;
        registry.declare(
            CONFIG_KMS_KEY,
            Some(Value::from(DEFAULT_KMS_KEY)),
            EnvBinding::Preferred {
                preferred: ENV_KMS_KEY,
                fallback: ENV_KMS_KEY_ALIAS,
            },
            env,
        )?;
        registry.declare(
            CONFIG_AWS_REGION,
            None,
            EnvBinding::Single(ENV_AWS_REGION),
            env,
        )?;
        registry.declare(
            CONFIG_USE_PATHS,
            Some(Value::from(DEFAULT_USE_PATHS)),
            EnvBinding::Single(ENV_USE_PATHS),
            env,
        )?;
        registry.declare(
            CONFIG_SKIP_BASE_CONFIG,
            Some(Value::from(DEFAULT_SKIP_BASE_CONFIG)),
            EnvBinding::Single(ENV_SKIP_BASE_CONFIG),
            env,
        )?;
        registry.declare(
            CONFIG_RETRIES,
            Some(Value::from(DEFAULT_RETRIES)),
            EnvBinding::Single(ENV_RETRIES),
            env,
        )?;

        Ok(Config { registry })
    }

    /// Use a parsed command line flag as a source for `name`
    ///
    /// # Errors
    ///
    /// Returns `ChamberConfigError::UnknownSetting` if `name` is not a known
    /// option.
    pub fn bind_flag(
        &mut self,
        name: &str,
        flag: Flag,
    ) -> Result<(), ChamberConfigError> {
        self.registry.bind_flag(name, flag)
    }

    /// Merge a JSON object or properties text on top of the other sources
    ///
    /// Keys present in `text` replace their previous values, other keys are
    /// left alone. Nothing is merged if `text` cannot be decoded.
    ///
    /// # Errors
    ///
    /// Returns `ChamberConfigError::DecodeFailed` if `text` is malformed.
    pub fn merge_config(
        &mut self,
        text: &str,
    ) -> Result<(), ChamberConfigError> {
        let values = decode(text)?;
        self.registry.merge(values);
        Ok(())
    }

    /// The environment variable an option was bound to, if any
    pub fn env_var(&self, name: &str) -> Option<&'static str> {
        self.registry.env_var(name)
    }

    /// Base configuration path; an empty string counts as unset
    pub fn base(&self) -> Option<String> {
        self.optional_string(CONFIG_BASE).filter(|v| !v.is_empty())
    }

    /// Normalized KMS key
    pub fn kms_key(&self) -> String {
        normalize_kms_key(&self.required_string(CONFIG_KMS_KEY))
    }

    pub fn aws_region(&self) -> Option<String> {
        self.optional_string(CONFIG_AWS_REGION)
    }

    pub fn use_paths(&self) -> bool {
        self.required_bool(CONFIG_USE_PATHS)
    }

    pub fn skip_base_config(&self) -> bool {
        self.required_bool(CONFIG_SKIP_BASE_CONFIG)
    }

    /// Path of the base configuration to load, or an empty string if there
    /// is none
    ///
    /// `skip-base-config` wins over a configured `base`.
    pub fn base_config_path(&self) -> String {
        if self.skip_base_config() {
            return String::new();
        }
        self.base().unwrap_or_default()
    }

    pub fn retries(&self) -> i64 {
        self.required_int(CONFIG_RETRIES)
    }

    /// Serialize every option that is set as an indented JSON object
    ///
    /// Options with a default are written with the type of their default.
    pub fn marshal(&self) -> Result<String, ChamberConfigError> {
        let settings: BTreeMap<String, JsonValue> = self
            .typed_settings()
            .iter()
            .map(|(k, v)| (k.clone(), to_json(v)))
            .collect();

        Ok(serde_json::to_string_pretty(&settings)?)
    }

    // Values that cannot be converted are kept as they are
    fn typed_settings(&self) -> BTreeMap<String, Value> {
        let mut settings = self.registry.all_settings();
        for (name, value) in settings.iter_mut() {
            if let Some(typed) = self
                .registry
                .default_value(name)
                .and_then(|default| typed_like(value, default))
            {
                *value = typed;
            }
        }
        settings
    }

    fn optional_string(&self, name: &str) -> Option<String> {
        self.registry.resolve(name).map(|v| {
            as_string(v).unwrap_or_else(|| {
                invariant_violation(name, "value cannot be read as a string")
            })
        })
    }

    fn required(&self, name: &str) -> &Value {
        match self.registry.resolve(name) {
            Some(value) => value,
            None => invariant_violation(
                name,
                "config option should have had a default",
            ),
        }
    }

    fn required_string(&self, name: &str) -> String {
        as_string(self.required(name)).unwrap_or_else(|| {
            invariant_violation(name, "value cannot be read as a string")
        })
    }

    fn required_bool(&self, name: &str) -> bool {
        as_bool(self.required(name)).unwrap_or_else(|| {
            invariant_violation(name, "value cannot be read as a boolean")
        })
    }

    fn required_int(&self, name: &str) -> i64 {
        as_int(self.required(name)).unwrap_or_else(|| {
            invariant_violation(name, "value cannot be read as an integer")
        })
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self
            .typed_settings()
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{{{settings}}}")
    }
}

// A declared option that cannot be read means the registry was built wrong
#[track_caller]
fn invariant_violation(name: &str, reason: &str) -> ! {
    error!("{name} {reason}");
    panic!("{name} {reason}");
}

fn as_string(value: &Value) -> Option<String> {
    match &value.kind {
        ValueKind::String(s) => Some(s.clone()),
        ValueKind::Boolean(b) => Some(b.to_string()),
        ValueKind::I64(i) => Some(i.to_string()),
        ValueKind::I128(i) => Some(i.to_string()),
        ValueKind::U64(u) => Some(u.to_string()),
        ValueKind::U128(u) => Some(u.to_string()),
        ValueKind::Float(f) => Some(f.to_string()),
        ValueKind::Nil | ValueKind::Table(_) | ValueKind::Array(_) => None,
    }
}

// Accepts t, T, TRUE and the like, which Value::into_bool rejects
fn as_bool(value: &Value) -> Option<bool> {
    match &value.kind {
        ValueKind::Boolean(b) => Some(*b),
        ValueKind::String(s) => match s.trim() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
            _ => None,
        },
        ValueKind::I64(i) => Some(*i != 0),
        ValueKind::I128(i) => Some(*i != 0),
        ValueKind::U64(u) => Some(*u != 0),
        ValueKind::U128(u) => Some(*u != 0),
        ValueKind::Float(f) => Some(*f != 0.0),
        ValueKind::Nil | ValueKind::Table(_) | ValueKind::Array(_) => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match &value.kind {
        ValueKind::I64(i) => Some(*i),
        ValueKind::I128(i) => i64::try_from(*i).ok(),
        ValueKind::U64(u) => i64::try_from(*u).ok(),
        ValueKind::U128(u) => i64::try_from(*u).ok(),
        // Truncated toward zero, saturating at the i64 bounds
        ValueKind::Float(f) => Some(f.trunc() as i64),
        ValueKind::String(s) => s.trim().parse().ok(),
        ValueKind::Boolean(b) => Some(i64::from(*b)),
        ValueKind::Nil | ValueKind::Table(_) | ValueKind::Array(_) => None,
    }
}

fn typed_like(value: &Value, default: &Value) -> Option<Value> {
    match default.kind {
        ValueKind::Boolean(_) => as_bool(value).map(Value::from),
        ValueKind::I64(_)
        | ValueKind::I128(_)
        | ValueKind::U64(_)
        | ValueKind::U128(_) => as_int(value).map(Value::from),
        ValueKind::String(_) => as_string(value).map(Value::from),
        ValueKind::Nil
        | ValueKind::Float(_)
        | ValueKind::Table(_)
        | ValueKind::Array(_) => None,
    }
}

fn to_json(value: &Value) -> JsonValue {
    match &value.kind {
        ValueKind::Nil => JsonValue::Null,
        ValueKind::Boolean(b) => JsonValue::Bool(*b),
        ValueKind::I64(i) => JsonValue::from(*i),
        ValueKind::U64(u) => JsonValue::from(*u),
        ValueKind::I128(i) => i64::try_from(*i)
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(i.to_string())),
        ValueKind::U128(u) => u64::try_from(*u)
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(u.to_string())),
        ValueKind::Float(f) => JsonValue::from(*f),
        ValueKind::String(s) => JsonValue::String(s.clone()),
        ValueKind::Table(t) => JsonValue::Object(
            t.iter().map(|(k, v)| (k.clone(), to_json(v))).collect(),
        ),
        ValueKind::Array(a) => {
            JsonValue::Array(a.iter().map(to_json).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ID: &str = "1234abcd-12ab-34cd-56ef-1234567890ab";
    const KEY_ARN: &str =
        "arn:aws:kms:us-east-1:111122223333:key/1234abcd-12ab-34cd-56ef-1234567890ab";

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let env = EnvConfig::from_vars(vars.iter().copied())
            .expect("failed to collect environment");
        Config::with_env(&env).expect("failed to create configuration")
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.base(), None);
        assert_eq!(config.kms_key(), DEFAULT_KMS_KEY);
        assert_eq!(config.aws_region(), None);
        assert_eq!(config.use_paths(), DEFAULT_USE_PATHS);
        assert_eq!(config.skip_base_config(), DEFAULT_SKIP_BASE_CONFIG);
        assert_eq!(config.base_config_path(), "");
        assert_eq!(config.retries(), DEFAULT_RETRIES);
    }

    #[test]
    fn test_normalize_kms_key() {
        assert_eq!(normalize_kms_key("abc"), "alias/abc");
        assert_eq!(normalize_kms_key("alias/abc"), "alias/abc");
        assert_eq!(normalize_kms_key(KEY_ARN), KEY_ARN);
        assert_eq!(normalize_kms_key(KEY_ID), KEY_ID);

        // Upper case key IDs are key IDs too
        assert_eq!(
            normalize_kms_key("1234ABCD-12AB-34CD-56EF-1234567890AB"),
            "1234ABCD-12AB-34CD-56EF-1234567890AB"
        );

        // Wrong group lengths make it an alias
        assert_eq!(
            normalize_kms_key("1234abc-12ab-34cd-56ef-1234567890ab"),
            "alias/1234abc-12ab-34cd-56ef-1234567890ab"
        );

        // Normalizing twice gives the same result
        assert_eq!(
            normalize_kms_key(&normalize_kms_key("abc")),
            normalize_kms_key("abc")
        );
    }

    #[test]
    fn test_kms_key_is_normalized_at_read_time() {
        let config = config_from(&[(ENV_KMS_KEY, "my-key")]);

        assert_eq!(config.kms_key(), "alias/my-key");

        // The stored value is untouched
        let marshalled: JsonValue = serde_json::from_str(
            &config.marshal().expect("failed to marshal"),
        )
        .expect("failed to parse marshalled config");
        assert_eq!(marshalled[CONFIG_KMS_KEY], "my-key");
    }

    #[test]
    fn test_kms_key_env_preference() {
        let config = config_from(&[
            (ENV_KMS_KEY, "preferred"),
            (ENV_KMS_KEY_ALIAS, "fallback"),
        ]);
        assert_eq!(config.kms_key(), "alias/preferred");
        assert_eq!(config.env_var(CONFIG_KMS_KEY), Some(ENV_KMS_KEY));

        let config = config_from(&[(ENV_KMS_KEY_ALIAS, "fallback")]);
        assert_eq!(config.kms_key(), "alias/fallback");
        assert_eq!(config.env_var(CONFIG_KMS_KEY), Some(ENV_KMS_KEY_ALIAS));

        // Present but empty preferred variable still wins, leaving the
        // default in place
        let config =
            config_from(&[(ENV_KMS_KEY, ""), (ENV_KMS_KEY_ALIAS, "fallback")]);
        assert_eq!(config.kms_key(), DEFAULT_KMS_KEY);
    }

    #[test]
    fn test_base_empty_is_absent() {
        let config = config_from(&[]);
        assert_eq!(config.base(), None);

        let mut config = config_from(&[(ENV_BASE, "/etc/chamber")]);
        assert_eq!(config.base(), Some("/etc/chamber".to_string()));

        config
            .merge_config(r#"{"base": ""}"#)
            .expect("failed to merge");
        assert_eq!(config.base(), None);
    }

    #[test]
    fn test_base_config_path() {
        // Skip wins over a configured base
        let config = config_from(&[
            (ENV_BASE, "/etc/chamber"),
            (ENV_SKIP_BASE_CONFIG, "true"),
        ]);
        assert_eq!(config.base_config_path(), "");

        // No base
        let config = config_from(&[(ENV_SKIP_BASE_CONFIG, "false")]);
        assert_eq!(config.base_config_path(), "");

        // Empty base
        let mut config = config_from(&[]);
        config.merge_config("base=").expect("failed to merge");
        assert_eq!(config.base_config_path(), "");

        let config = config_from(&[(ENV_BASE, "/etc/chamber")]);
        assert_eq!(config.base_config_path(), "/etc/chamber");
    }

    #[test]
    fn test_env_values_are_coerced() {
        let config = config_from(&[
            (ENV_USE_PATHS, "true"),
            (ENV_SKIP_BASE_CONFIG, "1"),
            (ENV_RETRIES, "3"),
            (ENV_AWS_REGION, "eu-west-1"),
        ]);

        assert!(config.use_paths());
        assert!(config.skip_base_config());
        assert_eq!(config.retries(), 3);
        assert_eq!(config.aws_region(), Some("eu-west-1".to_string()));
    }

    #[test]
    fn test_merge_retries() {
        let mut config = config_from(&[]);

        config
            .merge_config(r#"{"retries": 5}"#)
            .expect("failed to merge JSON");
        assert_eq!(config.retries(), 5);

        config
            .merge_config("retries=7")
            .expect("failed to merge properties");
        assert_eq!(config.retries(), 7);

        // Merging is additive, an empty object changes nothing
        config.merge_config("{}").expect("failed to merge JSON");
        assert_eq!(config.retries(), 7);
    }

    #[test]
    fn test_merge_invalid_leaves_values() {
        let mut config = config_from(&[]);
        config
            .merge_config(r#"{"retries": 5, "base": "/etc/chamber"}"#)
            .expect("failed to merge");
        let before = config.marshal().expect("failed to marshal");

        let result = config.merge_config("{invalid");
        assert!(matches!(
            result,
            Err(ChamberConfigError::DecodeFailed { .. })
        ));

        // A properties blob failing on its last line merges nothing either
        let result = config.merge_config("retries=1\nbroken line");
        assert!(matches!(
            result,
            Err(ChamberConfigError::DecodeFailed { .. })
        ));

        assert_eq!(config.marshal().expect("failed to marshal"), before);
        assert_eq!(config.retries(), 5);
    }

    #[test]
    fn test_merge_beats_flag_and_env() {
        let mut config = config_from(&[(ENV_RETRIES, "3")]);
        config
            .bind_flag(CONFIG_RETRIES, Flag::changed(4_i64))
            .expect("failed to bind flag");
        assert_eq!(config.retries(), 4);

        config.merge_config("retries=6").expect("failed to merge");
        assert_eq!(config.retries(), 6);
    }

    #[test]
    fn test_unchanged_flag_does_not_mask_env() {
        let mut config = config_from(&[(ENV_RETRIES, "3")]);
        config
            .bind_flag(CONFIG_RETRIES, Flag::unchanged(DEFAULT_RETRIES))
            .expect("failed to bind flag");

        assert_eq!(config.retries(), 3);
    }

    #[test]
    fn test_bind_flag_unknown_setting() {
        let mut config = config_from(&[]);
        let result = config.bind_flag("not-an-option", Flag::changed(true));

        assert!(matches!(
            result,
            Err(ChamberConfigError::UnknownSetting(_))
        ));
    }

    #[test]
    fn test_marshal() {
        let mut config = config_from(&[(ENV_BASE, "/etc/chamber")]);
        config
            .merge_config(r#"{"retries": 5, "extra": "kept"}"#)
            .expect("failed to merge");

        let expected = r#"{
  "base": "/etc/chamber",
  "extra": "kept",
  "kms-key": "alias/parameter_store_key",
  "retries": 5,
  "skip-base-config": false,
  "use-paths": false
}"#;
        assert_eq!(config.marshal().expect("failed to marshal"), expected);
    }

    #[test]
    fn test_marshal_uses_type_of_default() {
        let mut config = config_from(&[
            (ENV_RETRIES, "3"),
            (ENV_SKIP_BASE_CONFIG, "1"),
            (ENV_AWS_REGION, "eu-west-1"),
        ]);
        config
            .merge_config("use-paths=true\nkms-key=my-key")
            .expect("failed to merge");

        let marshalled: JsonValue = serde_json::from_str(
            &config.marshal().expect("failed to marshal"),
        )
        .expect("failed to parse marshalled config");

        assert_eq!(marshalled[CONFIG_RETRIES], 3);
        assert_eq!(marshalled[CONFIG_USE_PATHS], true);
        assert_eq!(marshalled[CONFIG_SKIP_BASE_CONFIG], true);
        assert_eq!(marshalled[CONFIG_KMS_KEY], "my-key");
        assert_eq!(marshalled[CONFIG_AWS_REGION], "eu-west-1");
    }

    #[test]
    fn test_marshal_keeps_unconvertible_values() {
        let mut config = config_from(&[(ENV_RETRIES, "many")]);
        config
            .merge_config(r#"{"kms-key": 1234}"#)
            .expect("failed to merge");

        let marshalled: JsonValue = serde_json::from_str(
            &config.marshal().expect("failed to marshal"),
        )
        .expect("failed to parse marshalled config");

        assert_eq!(marshalled[CONFIG_RETRIES], "many");
        assert_eq!(marshalled[CONFIG_KMS_KEY], "1234");
    }

    #[test]
    fn test_display() {
        let config = config_from(&[(ENV_RETRIES, "3")]);

        assert_eq!(
            config.to_string(),
            "{kms-key: alias/parameter_store_key, retries: 3, skip-base-config: false, use-paths: false}"
        );
    }

    #[test]
    #[should_panic(expected = "retries value cannot be read as an integer")]
    fn test_uncoercible_required_value_panics() {
        let config = config_from(&[(ENV_RETRIES, "many")]);
        let _ = config.retries();
    }

    #[test]
    #[should_panic(expected = "use-paths value cannot be read as a boolean")]
    fn test_uncoercible_bool_panics() {
        let mut config = config_from(&[]);
        config
            .merge_config(r#"{"use-paths": "sometimes"}"#)
            .expect("failed to merge");
        let _ = config.use_paths();
    }

    #[test]
    #[should_panic(expected = "base config option should have had a default")]
    fn test_unset_option_without_default_panics_when_required() {
        let config = config_from(&[]);
        let _ = config.required(CONFIG_BASE);
    }

    #[test]
    fn test_merged_null_keeps_default() {
        let mut config = config_from(&[]);
        config
            .merge_config(r#"{"retries": null}"#)
            .expect("failed to merge");

        assert_eq!(config.retries(), DEFAULT_RETRIES);
    }
}
