//! Artifact placement and delivery of the rendered bytes.

use crate::document::{DocumentSpec, OutputSpec};
use crate::error::{ConvertError, Result};
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};

const COPY_CHUNK: usize = 32 * 1024;

/// The file the renderer writes to.
///
/// Caller-chosen paths are kept. Any file already at such a path is removed
/// before rendering, so a renderer that writes nothing cannot leave stale
/// bytes looking like its output. Auto-named paths in the temp dir are removed
/// when the artifact is dropped, whatever the outcome of the conversion.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl Artifact {
    pub fn allocate(explicit: Option<&Path>, temp_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("removed previous output {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ConvertError::io(
                        format!("clearing previous output {}", path.display()),
                        e,
                    ));
                }
            }
            return Ok(Self {
                path: path.to_path_buf(),
                temp: None,
            });
        }
        let temp = tempfile::Builder::new()
            .prefix("wkconvert-")
            .suffix(".pdf")
            .tempfile_in(temp_dir)
            .map_err(|e| {
                ConvertError::io(format!("creating temp artifact in {}", temp_dir.display()), e)
            })?
            .into_temp_path();
        Ok(Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temp(&self) -> bool {
        self.temp.is_some()
    }

    /// A zero exit with no (or an empty) output file is still a failure.
    pub fn verify(&self) -> Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            Ok(_) => Err(ConvertError::missing_artifact(self.path.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ConvertError::missing_artifact(self.path.clone()))
            }
            Err(e) => Err(ConvertError::io(
                format!("stat artifact {}", self.path.display()),
                e,
            )),
        }
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };
        match temp.close() {
            Ok(()) => debug!("removed temp artifact {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove temp artifact {}: {e}", self.path.display()),
        }
    }
}

/// Routes the artifact's bytes to the stream and callback targets. Returns the
/// number of bytes copied to the stream.
///
/// With neither target set the file is not read at all.
pub fn deliver(doc: &DocumentSpec, artifact: &Path, output: OutputSpec<'_>) -> Result<u64> {
    if !output.needs_bytes() {
        return Ok(0);
    }
    let OutputSpec {
        stream, callback, ..
    } = output;
    let mut streamed = 0;

    if let Some(mut sink) = stream {
        let mut file = open(artifact)?;
        streamed = copy_chunked(&mut file, &mut sink)?;
        sink.flush()
            .map_err(|e| ConvertError::io("flushing output stream", e))?;
        debug!(bytes = streamed, "artifact streamed");
    }

    if let Some(callback) = callback {
        let bytes = std::fs::read(artifact).map_err(|e| {
            ConvertError::io(format!("reading artifact {}", artifact.display()), e)
        })?;
        debug!(bytes = bytes.len(), "invoking output callback");
        callback(doc, &bytes);
    }

    Ok(streamed)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| ConvertError::io(format!("opening artifact {}", path.display()), e))
}

fn copy_chunked(src: &mut impl Read, dst: &mut impl Write) -> Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConvertError::io("reading artifact", e)),
        };
        dst.write_all(&buf[..n])
            .map_err(|e| ConvertError::io("writing output stream", e))?;
        total += n as u64;
    }
    Ok(total)
}
