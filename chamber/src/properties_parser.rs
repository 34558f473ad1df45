// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "properties.pest"]
pub struct PropertiesParser;

#[derive(Error, Debug)]
pub enum PropertiesParsingError {
    #[error("failed to parse properties: {0}")]
    ParseError(#[source] Box<pest::error::Error<Rule>>),
}

/// Parses line oriented properties text and returns the `(key, value)` pairs
///
/// The input text:
///
/// * has one `key=value` or `key: value` entry per line
/// * can have blank lines, and comment lines starting with `#` or `!`
/// * can have white space around the key, the separator, and the value,
///   which is not part of the returned strings
///
/// Only the first separator splits the line, so the value can contain `=`
/// and `:`. Entries are returned in the order they appear, duplicated keys
/// included.
///
/// # Arguments
///
/// * `input` the text to be parsed
///
/// # Returns
///
/// The entries as a Vec<(&str, &str)>, or an error pointing at the first
/// line that is neither blank, a comment, nor an entry
///
/// # Examples
///
/// * `retries=7` => `[("retries", "7")]`
/// * `kms-key: alias/other` => `[("kms-key", "alias/other")]`
/// * `# comment\nbase = /etc/chamber` => `[("base", "/etc/chamber")]`
///
pub fn parse_properties(
    input: &str,
) -> Result<Vec<(&str, &str)>, PropertiesParsingError> {
    let mut entries = Vec::new();

    let Some(properties) = PropertiesParser::parse(Rule::properties, input)
        .map_err(|e| PropertiesParsingError::ParseError(Box::new(e)))?
        .next()
    else {
        return Ok(entries);
    };

    for item in properties.into_inner() {
        match item.as_rule() {
            Rule::entry => {
                let mut inner = item.into_inner();
                let key = inner.next().map(|k| k.as_str()).unwrap_or("");
                let value =
                    inner.next().map(|v| v.as_str().trim()).unwrap_or("");
                entries.push((key, value));
            }
            Rule::EOI => {
                break;
            }
            _ => {
                unreachable!()
            }
        }
    }

    Ok(entries)
}

// Unit Testing
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties() {
        // Single entry
        assert_eq!(
            parse_properties("retries=7").unwrap(), //#[allow_ci]
            [("retries", "7")]
        );

        // Colon separator
        assert_eq!(
            parse_properties("kms-key: alias/other").unwrap(), //#[allow_ci]
            [("kms-key", "alias/other")]
        );

        // White space around key, separator and value
        assert_eq!(
            parse_properties("  base =  /etc/chamber  ").unwrap(), //#[allow_ci]
            [("base", "/etc/chamber")]
        );

        // Separators inside the value are kept
        assert_eq!(
            parse_properties("kms-key=arn:aws:kms:us-east-1:1:key/a").unwrap(), //#[allow_ci]
            [("kms-key", "arn:aws:kms:us-east-1:1:key/a")]
        );
        assert_eq!(parse_properties("a=b=c").unwrap(), [("a", "b=c")]); //#[allow_ci]

        // Empty value
        assert_eq!(parse_properties("base=").unwrap(), [("base", "")]); //#[allow_ci]

        // Multiple lines, comments and blank lines
        assert_eq!(
            parse_properties(
                "# leading comment\n\nretries=3\n! other comment\nuse-paths=true\n"
            )
            .unwrap(), //#[allow_ci]
            [("retries", "3"), ("use-paths", "true")]
        );

        // Windows line endings
        assert_eq!(
            parse_properties("retries=3\r\nbase=x\r\n").unwrap(), //#[allow_ci]
            [("retries", "3"), ("base", "x")]
        );

        // Duplicated keys are all returned, in order
        assert_eq!(
            parse_properties("retries=1\nretries=2").unwrap(), //#[allow_ci]
            [("retries", "1"), ("retries", "2")]
        );

        // Empty input
        assert_eq!(parse_properties("").unwrap(), [] as [(&str, &str); 0]); //#[allow_ci]
        assert_eq!(
            parse_properties(" \n\t\n").unwrap(), //#[allow_ci]
            [] as [(&str, &str); 0]
        );
    }

    #[test]
    fn test_parse_properties_invalid() {
        // Line without separator
        assert!(parse_properties("retries").is_err());
        assert!(parse_properties("retries=1\njunk\n").is_err());

        // Key with inner white space
        assert!(parse_properties("my key=value").is_err());

        // Missing key
        assert!(parse_properties("=value").is_err());
    }
}
