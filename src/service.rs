use crate::{
    config::Environment,
    document::{DocumentSpec, OutputSpec},
    error::{ConvertError, Result},
    output::{self, Artifact},
    params,
    renderer::{Invocation, ProcessRenderer, Renderer},
};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Entry point for conversions.
///
/// Holds the default [`Environment`] for every call it serves; a single call
/// may substitute another through [`ConversionService::convert_with`].
pub struct ConversionService<R: Renderer = ProcessRenderer> {
    env: Environment,
    renderer: Arc<R>,
}

impl<R: Renderer> Clone for ConversionService<R> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            renderer: Arc::clone(&self.renderer),
        }
    }
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

impl ConversionService {
    pub fn new(env: Environment) -> Self {
        Self::with_renderer(env, ProcessRenderer::default())
    }
}

impl<R: Renderer> ConversionService<R> {
    pub fn with_renderer(env: Environment, renderer: R) -> Self {
        Self {
            env,
            renderer: Arc::new(renderer),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Converts on the calling thread using the service environment.
    pub fn convert(&self, doc: &DocumentSpec, output: OutputSpec<'_>) -> Result<()> {
        self.convert_with(doc, None, output)
    }

    /// Converts on the calling thread. `env`, when given, replaces the service
    /// environment for this call only.
    pub fn convert_with(
        &self,
        doc: &DocumentSpec,
        env: Option<&Environment>,
        output: OutputSpec<'_>,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.run(doc, env, output);
        match &result {
            Ok(()) => info!("conversion done in {:?}", started.elapsed()),
            Err(err) => warn!(kind = err.kind(), "conversion failed: {err}"),
        }
        result
    }

    fn run(&self, doc: &DocumentSpec, env: Option<&Environment>, output: OutputSpec<'_>) -> Result<()> {
        if !doc.has_source() {
            return Err(ConvertError::Configuration(format!(
                "You must supply a HTML string, if you have entered the url: {:?}",
                doc.url
            )));
        }

        let env = env.unwrap_or(&self.env);
        if !env.executable_path.exists() {
            return Err(ConvertError::missing_executable(&env.executable_path));
        }

        let source = if doc.reads_stdin() { "inline" } else { doc.url.as_str() };
        info!(source, output = %output.describe(), "conversion start");

        let artifact = Artifact::allocate(output.file_path.as_deref(), &env.temp_dir)?;
        let args = params::build_args(doc, &env.page_size, artifact.path());
        debug!(?args, "renderer arguments");

        let report = self.renderer.render(&Invocation {
            executable: &env.executable_path,
            args: &args,
            stdin: doc.stdin_payload().map(str::as_bytes),
            timeout: env.timeout,
            echo_diagnostics: env.debug,
        })?;
        debug!(pid = report.pid, "renderer exited cleanly after {:?}", report.elapsed);
        if !report.diagnostics.is_empty() {
            debug!(pid = report.pid, "renderer output: {}", report.diagnostics.trim_end());
        }

        let size = artifact.verify()?;
        debug!(bytes = size, temp = artifact.is_temp(), "artifact ready at {}", artifact.path().display());

        output::deliver(doc, artifact.path(), output)?;
        Ok(())
    }
}

impl<R: Renderer + 'static> ConversionService<R> {
    /// Runs [`convert`](Self::convert) on a worker thread.
    pub fn spawn(&self, doc: DocumentSpec, output: OutputSpec<'static>) -> Result<ConversionHandle> {
        let service = self.clone();
        let handle = std::thread::Builder::new()
            .name("wkconvert-worker".into())
            .spawn(move || service.convert(&doc, output))
            .map_err(|e| ConvertError::io("spawning conversion worker", e))?;
        Ok(ConversionHandle(handle))
    }

    /// Runs [`convert`](Self::convert) on tokio's blocking pool.
    #[cfg(feature = "async")]
    pub async fn convert_async(&self, doc: DocumentSpec, output: OutputSpec<'static>) -> Result<()> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.convert(&doc, output))
            .await
            .map_err(|e| ConvertError::Worker(e.to_string()))?
    }
}

/// A conversion running on a worker thread.
#[derive(Debug)]
pub struct ConversionHandle(JoinHandle<Result<()>>);

impl ConversionHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    /// Blocks until the conversion completes.
    pub fn join(self) -> Result<()> {
        self.0.join().map_err(|panic| {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".into());
            ConvertError::Worker(msg)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RenderReport;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records invocations and writes a fixed artifact.
    #[derive(Default)]
    struct FakeRenderer {
        calls: Mutex<Vec<(Vec<String>, Option<Vec<u8>>)>>,
        echoed: Mutex<Vec<bool>>,
    }

    impl Renderer for FakeRenderer {
        fn render(&self, inv: &Invocation<'_>) -> Result<RenderReport> {
            let args: Vec<String> = inv
                .args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let out = args.last().cloned().unwrap_or_default();
            std::fs::write(&out, b"%PDF-fake").unwrap();
            self.echoed.lock().unwrap().push(inv.echo_diagnostics);
            self.calls
                .lock()
                .unwrap()
                .push((args, inv.stdin.map(<[u8]>::to_vec)));
            Ok(RenderReport {
                pid: 0,
                diagnostics: String::new(),
                elapsed: Duration::ZERO,
            })
        }
    }

    fn service(dir: &std::path::Path) -> ConversionService<FakeRenderer> {
        // Any existing file passes the executable check.
        let exe = dir.join("renderer");
        std::fs::write(&exe, b"").unwrap();
        let env = Environment::default()
            .with_executable(exe)
            .with_temp_dir(dir);
        ConversionService::with_renderer(env, FakeRenderer::default())
    }

    #[test]
    fn missing_source_never_renders() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        for url in ["", "-"] {
            let err = svc
                .convert(&DocumentSpec::from_url(url), OutputSpec::default())
                .unwrap_err();
            assert!(err.is_configuration(), "{err}");
        }
        assert!(svc.renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_executable_never_renders() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let env = svc.environment().clone().with_executable(dir.path().join("nope"));
        let err = svc
            .convert_with(
                &DocumentSpec::from_url("http://example.com"),
                Some(&env),
                OutputSpec::default(),
            )
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("nope"));
        assert!(svc.renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn inline_html_goes_to_stdin_and_temp_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let mut sink = Vec::new();
        svc.convert(
            &DocumentSpec::from_html("<h1>test</h1>"),
            OutputSpec::to_stream(&mut sink),
        )
        .unwrap();
        assert_eq!(sink, b"%PDF-fake");

        let calls = svc.renderer.calls.lock().unwrap();
        let (args, stdin) = &calls[0];
        assert_eq!(args[args.len() - 2], "-");
        assert_eq!(stdin.as_deref(), Some(&b"<h1>test</h1>"[..]));
        let artifact = std::path::Path::new(&args[args.len() - 1]);
        assert!(artifact.starts_with(dir.path()));
        assert!(!artifact.exists());
    }

    #[test]
    fn url_document_does_not_pipe_html() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let out = dir.path().join("out.pdf");
        let mut doc = DocumentSpec::from_url("http://example.com");
        doc.html = Some("<p>unused</p>".into());
        svc.convert(&doc, OutputSpec::to_file(&out)).unwrap();

        let calls = svc.renderer.calls.lock().unwrap();
        let (args, stdin) = &calls[0];
        assert_eq!(args[args.len() - 2], "http://example.com");
        assert_eq!(args[args.len() - 1], out.to_string_lossy());
        assert!(stdin.is_none());
        assert!(out.exists());
    }

    #[test]
    fn debug_environment_echoes_renderer_output() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let doc = DocumentSpec::from_url("http://example.com");
        svc.convert(&doc, OutputSpec::default()).unwrap();
        let env = svc.environment().clone().with_debug(true);
        svc.convert_with(&doc, Some(&env), OutputSpec::default()).unwrap();
        assert_eq!(*svc.renderer.echoed.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn worker_handle_reports_same_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let handle = svc
            .spawn(DocumentSpec::from_url("-"), OutputSpec::default())
            .unwrap();
        assert!(handle.join().unwrap_err().is_configuration());
    }
}
