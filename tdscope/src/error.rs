//! Error types for tdscope.

use thiserror::Error;

/// The main error type for all tdscope operations.
///
/// Every variant is unrecoverable at the point where it occurs. Workflows
/// propagate it to their caller, which reports the kind together with the
/// file, group or channel that triggered it.
#[derive(Error, Debug)]
pub enum ScopeError {
    /// The measurement file is missing, unreadable or not a recognized format.
    #[error("file read error: {0}")]
    FileRead(#[from] FileReadError),

    /// The requested group/channel path does not exist in the file.
    #[error("channel not found: group '{group}', channel '{channel}'")]
    ChannelNotFound {
        /// The group name that was requested.
        group: String,
        /// The channel name that was requested.
        channel: String,
    },

    /// A sampling parameter is present but unusable (e.g. a zero increment).
    #[error("invalid sampling parameter for '{group}'/'{channel}': {reason}")]
    InvalidSamplingParameter {
        /// The group containing the channel.
        group: String,
        /// The channel whose parameter is invalid.
        channel: String,
        /// Description of what is wrong with the parameter.
        reason: String,
    },

    /// The channel carries no sampling increment and no fallback rate was given.
    #[error("no sampling rate for '{group}'/'{channel}': no wf_increment and no fallback rate")]
    MissingSamplingRate {
        /// The group containing the channel.
        group: String,
        /// The channel with no increment property.
        channel: String,
    },

    /// A measurement file could not be written.
    #[error("file write error: {0}")]
    Write(#[from] WriteError),

    /// The workflow configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while opening or decoding a measurement file.
#[derive(Error, Debug)]
pub enum FileReadError {
    /// The file could not be opened or inspected.
    #[error("failed to open '{path}': {source}")]
    Open {
        /// The path that could not be opened.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Memory mapping failed.
    #[error("memory mapping failed for file '{path}': {source}")]
    MemoryMap {
        /// The file path that failed to map.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file content is not a valid measurement file.
    #[error("'{path}' is not a valid TDMS file (offset {offset}): {reason}")]
    Format {
        /// The file path.
        path: String,
        /// Byte offset where decoding failed.
        offset: u64,
        /// Description of the problem.
        reason: String,
    },

    /// The file uses a feature this decoder does not handle.
    #[error("unsupported content in '{path}': {reason}")]
    Unsupported {
        /// The file path.
        path: String,
        /// Description of the unsupported feature.
        reason: String,
    },
}

/// Errors raised while writing a measurement file.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The file could not be created or written.
    #[error("failed to write '{path}': {source}")]
    Io {
        /// The file path being written.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The segment cannot be encoded with the file's current layout.
    #[error("cannot encode segment for '{path}': {reason}")]
    Layout {
        /// The file path being written.
        path: String,
        /// Why the segment was rejected.
        reason: String,
    },
}

/// Errors raised while loading or validating a workflow configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{path}': {source}")]
    Read {
        /// The config file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected structure.
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        /// The config file path.
        path: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of what is invalid.
        reason: String,
    },
}

/// Type alias for `Result<T, ScopeError>`.
pub type Result<T> = std::result::Result<T, ScopeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_not_found_names_group_and_channel() {
        let err = ScopeError::ChannelNotFound {
            group: "Log".to_string(),
            channel: "Dev1/ai99".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("'Log'"));
        assert!(message.contains("'Dev1/ai99'"));
    }

    #[test]
    fn test_file_read_converts_into_scope_error() {
        let err: ScopeError = FileReadError::Format {
            path: "broken.tdms".to_string(),
            offset: 0,
            reason: "bad tag".to_string(),
        }
        .into();
        assert!(matches!(err, ScopeError::FileRead(FileReadError::Format { .. })));
        assert!(err.to_string().contains("broken.tdms"));
    }

    #[test]
    fn test_write_errors_are_not_read_errors() {
        let err: ScopeError = WriteError::Layout {
            path: "out.tdms".to_string(),
            reason: "uneven channels".to_string(),
        }
        .into();
        assert!(matches!(err, ScopeError::Write(WriteError::Layout { .. })));
        assert_eq!(
            err.to_string(),
            "file write error: cannot encode segment for 'out.tdms': uneven channels"
        );
    }
}
