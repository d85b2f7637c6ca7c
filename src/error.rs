//! Error types returned by conversions.
//!
//! Every failure of a conversion is reported exactly once as a
//! [`ConvertError`]. Nothing is retried and nothing is swallowed, with the
//! single exception of temp-artifact cleanup, which is only logged.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The request cannot run: no source supplied, or no renderer at the
    /// configured path. Raised before any subprocess exists.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The renderer exited with a nonzero code, or exited cleanly without
    /// producing output. The exit code stays available as a field.
    #[error("Html to PDF conversion of document failed. Renderer output:\n{diagnostics}")]
    Conversion {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    /// The renderer did not finish in time and was killed.
    #[error("HTML to PDF conversion process has not finished in the given period ({timeout:?})")]
    Timeout { timeout: Duration },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The worker running a non-blocking conversion panicked.
    #[error("conversion worker failed: {0}")]
    Worker(String),
}

impl ConvertError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn missing_executable(path: &std::path::Path) -> Self {
        Self::Configuration(format!(
            "File '{}' not found. Check if wkhtmltopdf application is installed.",
            path.display()
        ))
    }

    pub(crate) fn missing_artifact(path: PathBuf) -> Self {
        Self::Conversion {
            exit_code: Some(0),
            diagnostics: format!("output file '{}' not found", path.display()),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short stable label, used in logs and for comparing outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Conversion { .. } => "conversion",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "io",
            Self::Worker(_) => "worker",
        }
    }
}
