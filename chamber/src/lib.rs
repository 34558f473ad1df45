// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

pub mod config;
pub mod properties_parser;
