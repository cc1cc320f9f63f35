// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors raised while parsing or validating a job definition document.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The document is not valid TOML (or is missing required fields).
    /// Uploads fail outright on this.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The document parsed but violates a semantic rule. Uploads are
    /// still saved, carrying this message as `validation_error`.
    #[error("invalid definition: {0}")]
    Invalid(String),
}
