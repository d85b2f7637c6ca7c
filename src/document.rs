use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// URL value meaning "read the HTML from the inline payload".
pub const STDIN_MARKER: &str = "-";

/// Opaque value carried on a document for callback correlation.
pub type DocumentState = Arc<dyn Any + Send + Sync>;

/// A document to convert.
///
/// Either `url` names a page the renderer fetches, or `url` is empty / the
/// [`STDIN_MARKER`] and `html` holds the markup to pipe in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSpec {
    pub url: String,
    pub html: Option<String>,
    pub header_url: Option<String>,
    pub footer_url: Option<String>,
    pub header_left: Option<String>,
    pub header_center: Option<String>,
    pub header_right: Option<String>,
    pub footer_left: Option<String>,
    pub footer_center: Option<String>,
    pub footer_right: Option<String>,
    /// Sent with every fetch the renderer makes, in order.
    pub cookies: Vec<(String, String)>,
    /// Passed to the renderer verbatim as `--<key> <value>`, in order.
    pub extra_params: Vec<(String, String)>,
    #[serde(skip)]
    pub state: Option<DocumentState>,
}

impl DocumentSpec {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            url: STDIN_MARKER.into(),
            html: Some(html.into()),
            ..Default::default()
        }
    }

    pub fn with_state<T: Any + Send + Sync>(mut self, state: T) -> Self {
        self.state = Some(Arc::new(state));
        self
    }

    pub fn state_ref<T: Any>(&self) -> Option<&T> {
        self.state.as_deref().and_then(|s| s.downcast_ref::<T>())
    }

    /// True when there is no URL to fetch, so the source must be `html`.
    pub fn reads_stdin(&self) -> bool {
        self.url.is_empty() || self.url == STDIN_MARKER
    }

    /// The HTML to write to the renderer's stdin, if the document reads it.
    pub fn stdin_payload(&self) -> Option<&str> {
        if self.reads_stdin() {
            self.html.as_deref()
        } else {
            None
        }
    }

    pub fn has_source(&self) -> bool {
        !self.reads_stdin() || self.html.is_some()
    }
}

pub type OutputCallback<'a> = Box<dyn FnOnce(&DocumentSpec, &[u8]) + Send + 'a>;

/// Where the converted bytes go. Any combination of targets may be set; with
/// none, the result is discarded.
#[derive(Default)]
pub struct OutputSpec<'a> {
    /// Explicit destination. The file is kept after the call.
    pub file_path: Option<PathBuf>,
    pub stream: Option<Box<dyn Write + Send + 'a>>,
    pub callback: Option<OutputCallback<'a>>,
}

impl<'a> OutputSpec<'a> {
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn to_stream(stream: impl Write + Send + 'a) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            ..Default::default()
        }
    }

    pub fn to_callback(callback: impl FnOnce(&DocumentSpec, &[u8]) + Send + 'a) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            ..Default::default()
        }
    }

    pub fn with_stream(mut self, stream: impl Write + Send + 'a) -> Self {
        self.stream = Some(Box::new(stream));
        self
    }

    pub fn with_callback(
        mut self,
        callback: impl FnOnce(&DocumentSpec, &[u8]) + Send + 'a,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Whether the artifact has to be read back after rendering.
    pub fn needs_bytes(&self) -> bool {
        self.stream.is_some() || self.callback.is_some()
    }

    pub(crate) fn describe(&self) -> String {
        let mut kinds = Vec::new();
        if self.file_path.is_some() {
            kinds.push("file");
        }
        if self.stream.is_some() {
            kinds.push("stream");
        }
        if self.callback.is_some() {
            kinds.push("callback");
        }
        if kinds.is_empty() {
            "discard".into()
        } else {
            kinds.join("+")
        }
    }
}

impl fmt::Debug for OutputSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSpec")
            .field("file_path", &self.file_path)
            .field("stream", &self.stream.is_some())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
