//! [`SettingsError`].

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The settings file, or the merged result, is not valid settings JSON.
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A field holds a value no component can run with.
    #[error("{field} {reason}")]
    Invalid {
        /// camelCase path of the field, e.g. `session.userId`.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_the_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/relay/settings.json"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("cannot read /etc/relay/settings.json: "));
    }

    #[test]
    fn invalid_reads_as_a_sentence() {
        let err = SettingsError::Invalid {
            field: "session.backlogChunkSize",
            reason: "must be at least 1",
        };
        assert_eq!(err.to_string(), "session.backlogChunkSize must be at least 1");
    }
}
