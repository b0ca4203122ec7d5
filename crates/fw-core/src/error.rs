//! Unified error type for the ffwright engine.
//!
//! All crates funnel their failures into [`Error`]. Each variant belongs to
//! one [`ErrorCategory`], which tells callers at which stage a job failed.

/// Stage of a job at which an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid caller configuration, raised synchronously.
    Configuration,
    /// Requested format or codec not advertised by the installed tool.
    Capability,
    /// Executable could not be located.
    Resolution,
    /// The spawned process failed.
    Process,
    /// The job exceeded its configured timeout.
    Timeout,
    /// The metadata probe failed.
    Probe,
}

/// Unified error type covering all failure modes of a transcode job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration (bad size, missing input, ...).
    #[error("{0}")]
    Config(String),

    /// Requested format/codec is not available in the installed tool.
    #[error("{0}")]
    Capability(String),

    /// An executable could not be found.
    #[error("Cannot find {tool}")]
    ToolNotFound {
        /// Name of the missing tool.
        tool: String,
    },

    /// The external process failed.
    #[error("{message}")]
    Process {
        /// Human-readable description, including the stderr extract.
        message: String,
        /// Captured standard output tail.
        stdout: String,
        /// Captured standard error tail.
        stderr: String,
    },

    /// The job ran past its timeout and was killed.
    #[error("process ran into a timeout ({seconds}s)")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
        /// Captured standard error tail.
        stderr: String,
    },

    /// The readable stream feeding the process failed.
    #[error("Input stream error: {0}")]
    InputStream(String),

    /// The writable stream receiving process output failed.
    #[error("Output stream error: {0}")]
    OutputStream(String),

    /// Metadata probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Configuration JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The taxonomy class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::Json(_) => ErrorCategory::Configuration,
            Error::Capability(_) => ErrorCategory::Capability,
            Error::ToolNotFound { .. } => ErrorCategory::Resolution,
            Error::Process { .. }
            | Error::InputStream(_)
            | Error::OutputStream(_)
            | Error::Io { .. } => ErrorCategory::Process,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Probe(_) => ErrorCategory::Probe,
        }
    }

    /// Captured stderr, when the error came out of a process run.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::Process { stderr, .. } | Error::Timeout { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Convenience constructor for [`Error::ToolNotFound`].
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Error::ToolNotFound { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::Process`] without captured output.
    pub fn process(message: impl Into<String>) -> Self {
        Error::Process {
            message: message.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Build a capability error for a list of unavailable values.
    ///
    /// `singular`/`plural` are the leading nouns, e.g. `"Output format"` and
    /// `"Output formats"`. Returns `None` for an empty list.
    pub fn unavailable(singular: &str, plural: &str, values: &[String]) -> Option<Self> {
        match values {
            [] => None,
            [one] => Some(Error::Capability(format!("{singular} {one} is not available"))),
            many => Some(Error::Capability(format!(
                "{plural} {} are not available",
                many.join(", ")
            ))),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_display() {
        let err = Error::config("No input specified");
        assert_eq!(err.to_string(), "No input specified");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn tool_not_found_display() {
        let err = Error::tool_not_found("ffmpeg");
        assert_eq!(err.to_string(), "Cannot find ffmpeg");
        assert_eq!(err.category(), ErrorCategory::Resolution);
    }

    #[test]
    fn unavailable_single_and_plural() {
        let one = Error::unavailable("Output format", "Output formats", &["foo".into()]).unwrap();
        assert_eq!(one.to_string(), "Output format foo is not available");
        assert_eq!(one.category(), ErrorCategory::Capability);

        let many = Error::unavailable(
            "Audio codec",
            "Audio codecs",
            &["a".into(), "b".into()],
        )
        .unwrap();
        assert_eq!(many.to_string(), "Audio codecs a, b are not available");

        assert!(Error::unavailable("Video codec", "Video codecs", &[]).is_none());
    }

    #[test]
    fn timeout_carries_stderr() {
        let err = Error::Timeout {
            seconds: 3,
            stderr: "frame=1".into(),
        };
        assert_eq!(err.to_string(), "process ran into a timeout (3s)");
        assert_eq!(err.stderr(), Some("frame=1"));
        assert_eq!(err.category(), ErrorCategory::Timeout);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.category(), ErrorCategory::Process);
    }

    #[test]
    fn stream_errors_are_process_errors() {
        assert_eq!(
            Error::InputStream("boom".into()).to_string(),
            "Input stream error: boom"
        );
        assert_eq!(
            Error::OutputStream("x".into()).category(),
            ErrorCategory::Process
        );
    }
}
