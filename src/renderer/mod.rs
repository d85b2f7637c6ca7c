pub mod process;

use crate::error::Result;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

pub use process::ProcessRenderer;

/// One renderer run, fully resolved.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub executable: &'a Path,
    pub args: &'a [OsString],
    /// Written to the renderer's stdin, which is then closed.
    pub stdin: Option<&'a [u8]>,
    pub timeout: Duration,
    pub echo_diagnostics: bool,
}

#[derive(Debug, Clone)]
pub struct RenderReport {
    pub pid: u32,
    pub diagnostics: String,
    pub elapsed: Duration,
}

/// Runs the renderer to completion.
///
/// `Ok` means the renderer exited with code 0 and the artifact named by the
/// last argument may be read. Nonzero exits map to
/// [`ConvertError::Conversion`](crate::ConvertError::Conversion) and overruns
/// to [`ConvertError::Timeout`](crate::ConvertError::Timeout).
pub trait Renderer: Send + Sync {
    fn render(&self, invocation: &Invocation<'_>) -> Result<RenderReport>;
}
