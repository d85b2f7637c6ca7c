//! HTML to PDF conversion by way of an external renderer (wkhtmltopdf).
//!
//! A [`DocumentSpec`] names the source, a URL or inline HTML, plus header,
//! footer, cookie and pass-through options. An [`OutputSpec`] says where the
//! PDF goes: a file, a stream, a callback, or any mix of them.
//! [`ConversionService`] runs the renderer under a timeout and delivers the
//! result, either on the calling thread or on a worker.
//!
//! ```no_run
//! use wkconvert::{ConversionService, DocumentSpec, Environment, OutputSpec};
//!
//! let env = Environment::default().with_executable("/usr/bin/wkhtmltopdf");
//! let service = ConversionService::new(env);
//! service.convert(
//!     &DocumentSpec::from_html("<h1>Hello</h1>"),
//!     OutputSpec::to_file("hello.pdf"),
//! )?;
//! # Ok::<(), wkconvert::ConvertError>(())
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod params;
pub mod renderer;
pub mod service;
pub mod util;

pub use config::{Config, Environment};
pub use document::{DocumentSpec, OutputSpec, STDIN_MARKER};
pub use error::{ConvertError, Result};
pub use service::{ConversionHandle, ConversionService};

/// Converts with `env`, or the default environment when `None`.
pub fn convert(doc: &DocumentSpec, env: Option<&Environment>, output: OutputSpec<'_>) -> Result<()> {
    let env = env.cloned().unwrap_or_default();
    ConversionService::new(env).convert(doc, output)
}

/// Non-blocking form of [`convert`].
#[cfg(feature = "async")]
pub async fn convert_async(
    doc: DocumentSpec,
    env: Option<Environment>,
    output: OutputSpec<'static>,
) -> Result<()> {
    ConversionService::new(env.unwrap_or_default())
        .convert_async(doc, output)
        .await
}
