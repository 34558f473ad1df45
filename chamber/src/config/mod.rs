// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Chamber Authors

mod base;
mod env;
mod error;
mod merge;
mod registry;

pub use base::*;
pub use env::*;
pub use error::*;
pub use merge::*;
pub use registry::*;
