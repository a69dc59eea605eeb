//! Error types and handling for the Places2Go data layer

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Places2Go data layer
#[derive(Error, Debug)]
pub enum DashboardError {
    /// A backing data file does not exist
    #[error("Data file for {dataset} not found: {}", .path.display())]
    NotFound { dataset: String, path: PathBuf },

    /// A backing data file exists but could not be parsed into a table
    #[error("Failed to load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// A table failed schema or range checks
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// One or more required columns are absent
    #[error("{}", missing_columns_message(.missing, .available))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

fn missing_columns_message(missing: &[String], available: &[String]) -> String {
    let mut message = if missing.len() == 1 {
        format!("Required column missing: {}", missing[0])
    } else {
        format!("Required columns missing: {}", missing.join(", "))
    };
    if !available.is_empty() {
        message.push_str(&format!("; available columns: {}", available.join(", ")));
    }
    message
}

impl DashboardError {
    /// Create a new not-found error for a dataset file
    pub fn not_found<S: Into<String>, P: Into<PathBuf>>(dataset: S, path: P) -> Self {
        Self::NotFound {
            dataset: dataset.into(),
            path: path.into(),
        }
    }

    /// Create a new load error for an unparseable file
    pub fn load<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new missing-column error
    pub fn missing_columns<I, J, S, T>(missing: I, available: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self::MissingColumns {
            missing: missing.into_iter().map(Into::into).collect(),
            available: available.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// True for schema/range failures, including missing columns
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::MissingColumns { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::NotFound { dataset, .. } => {
                format!("No {dataset} data is available. Please check the data directory.")
            }
            DashboardError::Load { .. } => {
                "A data file could not be read. It may be corrupted or in the wrong format."
                    .to_string()
            }
            DashboardError::Validation { message } => format!("Invalid data: {message}"),
            DashboardError::MissingColumns { missing, .. } => {
                format!("Data is missing columns: {}", missing.join(", "))
            }
            DashboardError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            DashboardError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            DashboardError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}
