// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

use crate::{config::ChamberConfigError, properties_parser::parse_properties};
use config::{File, FileFormat, Map, Source, Value};
use log::*;
use std::fmt;

/// Encoding of an override configuration blob
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobFormat {
    Json,
    Properties,
}

impl fmt::Display for BlobFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobFormat::Json => write!(f, "JSON"),
            BlobFormat::Properties => write!(f, "properties"),
        }
    }
}

/// Text starting with `{`, ignoring leading white space, is a JSON object;
/// anything else is properties text
pub fn detect_format(text: &str) -> BlobFormat {
    if text.trim_start().starts_with('{') {
        BlobFormat::Json
    } else {
        BlobFormat::Properties
    }
}

/// Decode an override configuration blob into a flat map
///
/// JSON values keep their native type. Properties values are strings.
///
/// # Errors
///
/// Returns `ChamberConfigError::DecodeFailed` if the text is not valid for
/// the detected format.
pub fn decode(text: &str) -> Result<Map<String, Value>, ChamberConfigError> {
    let format = detect_format(text);
    debug!("Decoding override configuration as {format}");

    match format {
        BlobFormat::Json => File::from_str(text, FileFormat::Json)
            .collect()
            .map_err(|e| ChamberConfigError::DecodeFailed {
                format,
                reason: e.to_string(),
            }),
        BlobFormat::Properties => {
            let entries = parse_properties(text).map_err(|e| {
                ChamberConfigError::DecodeFailed {
                    format,
                    reason: e.to_string(),
                }
            })?;
            Ok(entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::from(v)))
                .collect())
        }
    }
}
