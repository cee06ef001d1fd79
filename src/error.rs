// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for the catalog core

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Everything that can go wrong inside the catalog core
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Reading or writing a backend file failed
    #[error("store I/O failed at {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A stored or submitted document is not valid JSON for its type
    #[error("failed to parse {what}: {source}")]
    Parse {
        /// What was being parsed (a key, a payload name)
        what: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        /// What was being serialized
        what: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// A module key is not of the form `name@revision/organization`
    #[error("invalid module key: {0}")]
    InvalidKey(String),

    /// A vendor key does not decode into its path segments
    #[error("invalid vendor key: {0}")]
    InvalidVendorKey(String),

    /// A vendor selector sets a component after an unset one
    #[error("invalid vendor selector: {0}")]
    InvalidSelector(String),

    /// A job name has no registered handler
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// A job payload has the wrong shape
    #[error("invalid payload for {job}: {reason}")]
    InvalidPayload {
        /// Job name
        job: String,
        /// What was wrong
        reason: String,
    },

    /// A notification sink refused an event
    #[error("notification failed: {0}")]
    Notification(String),
}

impl CatalogError {
    /// Shorthand for a [`CatalogError::Parse`]
    pub fn parse(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            what: what.into(),
            source,
        }
    }

    /// Shorthand for a [`CatalogError::Serialize`]
    pub fn serialize(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            what: what.into(),
            source,
        }
    }
}
