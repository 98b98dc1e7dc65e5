// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// oclink: core types, status codes, and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod info;
pub mod status;
pub mod types;

pub use config::BindingConfig;
pub use error::{OclinkError, Result};
pub use status::StatusCode;
pub use types::*;
