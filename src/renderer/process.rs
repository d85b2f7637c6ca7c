use super::{Invocation, RenderReport, Renderer};
use crate::error::{ConvertError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_POLL: Duration = Duration::from_millis(20);
const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 3600);

/// Runs the renderer as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    poll_interval: Duration,
}

impl Default for ProcessRenderer {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL,
        }
    }
}

impl ProcessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often exit status is polled while waiting.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}

impl Renderer for ProcessRenderer {
    fn render(&self, inv: &Invocation<'_>) -> Result<RenderReport> {
        let started = Instant::now();
        let deadline = started
            .checked_add(inv.timeout)
            .unwrap_or_else(|| started + MAX_WAIT);

        let mut cmd = Command::new(inv.executable);
        cmd.args(inv.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| {
            ConvertError::io(
                format!("spawning renderer: {}", inv.executable.display()),
                e,
            )
        })?;
        let mut child = RunningChild(child);
        let pid = child.0.id();
        debug!(pid, args = inv.args.len(), "renderer started");

        if let Some(out) = child.0.stdout.take() {
            spawn_stdout_discard(out)?;
        }
        let drained = match child.0.stderr.take() {
            Some(err) => spawn_stderr_drain(err, inv.echo_diagnostics)?,
            None => {
                return Err(ConvertError::io(
                    "capturing renderer stderr",
                    io::Error::other("stderr pipe missing"),
                ));
            }
        };

        // Closing stdin is what lets a renderer reading `-` start work.
        if let Some(mut stdin) = child.0.stdin.take() {
            if let Some(payload) = inv.stdin {
                if let Err(e) = stdin.write_all(payload).and_then(|_| stdin.flush()) {
                    warn!(pid, "writing html to renderer stdin failed: {e}");
                }
            }
        }

        let (status, diagnostics) = match self.await_completion(&mut child, &drained, deadline)? {
            Some(done) => done,
            None => {
                warn!(pid, "renderer timed out after {:?}; killing", inv.timeout);
                child.terminate();
                return Err(ConvertError::Timeout {
                    timeout: inv.timeout,
                });
            }
        };

        let elapsed = started.elapsed();
        if !status.success() {
            debug!(pid, ?status, "renderer failed after {:?}", elapsed);
            return Err(ConvertError::Conversion {
                exit_code: status.code(),
                diagnostics,
            });
        }

        debug!(pid, "renderer finished in {:?}", elapsed);
        Ok(RenderReport {
            pid,
            diagnostics,
            elapsed,
        })
    }
}

impl ProcessRenderer {
    /// Waits for both the exit status and the end of stderr. `None` means the
    /// deadline passed first.
    fn await_completion(
        &self,
        child: &mut RunningChild,
        drained: &Receiver<String>,
        deadline: Instant,
    ) -> Result<Option<(ExitStatus, String)>> {
        let mut exited: Option<ExitStatus> = None;
        let mut diagnostics: Option<String> = None;

        loop {
            if exited.is_none() {
                exited = child
                    .0
                    .try_wait()
                    .map_err(|e| ConvertError::io("waiting for renderer", e))?;
            }
            if let (Some(status), Some(text)) = (exited, diagnostics.as_ref()) {
                return Ok(Some((status, text.clone())));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let tick = (deadline - now).min(self.poll_interval);

            if diagnostics.is_some() {
                std::thread::sleep(tick);
                continue;
            }
            match drained.recv_timeout(tick) {
                Ok(text) => diagnostics = Some(text),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("stderr drain ended without a result");
                    diagnostics = Some(String::new());
                }
            }
        }
    }
}

/// Kills and reaps the child if it is still running when dropped.
struct RunningChild(Child);

impl RunningChild {
    fn terminate(&mut self) {
        match self.0.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                if let Err(e) = self.0.kill() {
                    debug!(pid = self.0.id(), "kill failed: {e}");
                }
            }
        }
        let _ = self.0.wait();
    }
}

impl Drop for RunningChild {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn spawn_stderr_drain(stderr: ChildStderr, echo: bool) -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("wkconvert-stderr".into())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut buf = String::new();
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        let text = text.trim_end_matches(['\r', '\n']);
                        if echo {
                            debug!(target: "wkconvert::renderer", "{text}");
                        }
                        buf.push_str(text);
                        buf.push('\n');
                    }
                    Err(e) => {
                        debug!("reading renderer stderr: {e}");
                        break;
                    }
                }
            }
            let _ = tx.send(buf);
        })
        .map_err(|e| ConvertError::io("spawning stderr reader", e))?;
    Ok(rx)
}

fn spawn_stdout_discard(mut stdout: ChildStdout) -> Result<()> {
    std::thread::Builder::new()
        .name("wkconvert-stdout".into())
        .spawn(move || {
            let mut sink = std::io::sink();
            let mut buf = [0u8; 8192];
            while let Ok(n) = stdout.read(&mut buf) {
                if n == 0 || sink.write_all(&buf[..n]).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| ConvertError::io("spawning stdout reader", e))?;
    Ok(())
}
