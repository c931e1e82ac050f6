//! Headless browser engines: chromium and wkhtmltopdf.
//!
//! Every attempt runs inside a [`BrowserSession`] that owns the child
//! process and its scratch directory. The session is closed on every exit
//! path: normal exit is awaited, a timeout kills and reaps the process, and
//! dropping the session (an error, a panic, a cancelled future) kills it via
//! `kill_on_drop`. Sessions are never pooled or reused.

use crate::config::{DocGenConfig, PageSize};
use crate::pdf::{EngineError, PdfEngine, RenderRequest};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

static OPEN_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Number of browser sessions currently alive in this process.
pub fn open_browser_sessions() -> usize {
    OPEN_SESSIONS.load(Ordering::SeqCst)
}

/// Chromium executables searched on `PATH`, in order.
pub const CHROMIUM_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// First executable named in `candidates` found on `PATH`.
pub fn find_executable(candidates: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        candidates
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    })
}

// ── Session ──────────────────────────────────────────────────────────────

/// One browser process plus the directory holding its input and output.
struct BrowserSession {
    engine: &'static str,
    child: Option<Child>,
    dir: TempDir,
}

impl BrowserSession {
    /// Create the scratch directory and write the HTML input.
    async fn prepare(engine: &'static str, html: &str) -> Result<(TempDir, PathBuf), EngineError> {
        let dir = TempDir::new().map_err(|e| EngineError::Io(format!("temp dir: {e}")))?;
        let input = dir.path().join("document.html");
        tokio::fs::write(&input, html)
            .await
            .map_err(|e| EngineError::Io(format!("{engine}: writing input: {e}")))?;
        Ok((dir, input))
    }

    fn spawn(
        engine: &'static str,
        program: &Path,
        args: &[String],
        dir: TempDir,
    ) -> Result<Self, EngineError> {
        let child = Command::new(program)
            .args(args)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: program.display().to_string(),
                source: e,
            })?;
        OPEN_SESSIONS.fetch_add(1, Ordering::SeqCst);
        debug!("{}: spawned {} (pid {:?})", engine, program.display(), child.id());
        Ok(Self {
            engine,
            child: Some(child),
            dir,
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Wait for exit, collecting stderr. On timeout the process is killed
    /// and reaped before returning.
    async fn wait(&mut self, timeout: Duration) -> Result<(ExitStatus, String), EngineError> {
        let Some(child) = self.child.as_mut() else {
            return Err(EngineError::Io(format!("{}: session already closed", self.engine)));
        };
        let mut stderr = child.stderr.take();

        let run = async {
            let read_stderr = async {
                let mut buf = String::new();
                if let Some(pipe) = stderr.as_mut() {
                    let _ = pipe.read_to_string(&mut buf).await;
                }
                buf
            };
            let (status, err) = tokio::join!(child.wait(), read_stderr);
            (status, err)
        };

        let outcome = tokio::time::timeout(timeout, run).await;
        match outcome {
            Ok((status, err)) => {
                let status = status.map_err(|e| EngineError::Io(format!("{}: wait: {e}", self.engine)))?;
                self.child = None;
                Ok((status, err))
            }
            Err(_) => {
                warn!("{}: timed out after {:?}, killing", self.engine, timeout);
                if let Some(mut child) = self.child.take() {
                    let _ = child.kill().await;
                }
                Err(EngineError::TimedOut {
                    secs: timeout.as_secs(),
                })
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Still running: an error or cancellation cut the attempt short.
            let _ = child.start_kill();
        }
        OPEN_SESSIONS.fetch_sub(1, Ordering::SeqCst);
        debug!("{}: session closed", self.engine);
    }
}

/// Run one engine invocation and return the PDF it wrote to `output.pdf`.
async fn run_session(
    engine: &'static str,
    program: &Path,
    html: &str,
    args: impl FnOnce(&Path, &Path) -> Vec<String>,
    timeout: Duration,
) -> Result<Vec<u8>, EngineError> {
    let (dir, input) = BrowserSession::prepare(engine, html).await?;
    let output = dir.path().join("output.pdf");
    let args = args(&input, &output);
    let mut session = BrowserSession::spawn(engine, program, &args, dir)?;

    let (status, stderr) = session.wait(timeout).await?;
    if !status.success() {
        return Err(EngineError::Exited {
            code: status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    let bytes = tokio::fs::read(session.path("output.pdf"))
        .await
        .map_err(|e| EngineError::Output(format!("no PDF written ({e}); stderr: {}", stderr.trim())))?;
    if !bytes.starts_with(b"%PDF") {
        return Err(EngineError::Output(format!(
            "output is not a PDF ({} bytes)",
            bytes.len()
        )));
    }
    Ok(bytes)
}

// ── Chromium ─────────────────────────────────────────────────────────────

/// Headless chromium `--print-to-pdf`.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    pub executable: Option<PathBuf>,
    pub timeout: Duration,
}

impl ChromiumEngine {
    pub fn from_config(config: &DocGenConfig) -> Self {
        Self {
            executable: config.chromium_path.clone(),
            timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }

    fn program(&self) -> Result<PathBuf, EngineError> {
        self.executable
            .clone()
            .or_else(|| find_executable(CHROMIUM_CANDIDATES))
            .ok_or_else(|| EngineError::NotFound {
                program: CHROMIUM_CANDIDATES.join(" / "),
            })
    }
}

/// Arguments for one chromium print.
pub fn chromium_args(input: &Path, output: &Path, profile: &Path) -> Vec<String> {
    vec![
        "--headless".into(),
        "--disable-gpu".into(),
        "--no-sandbox".into(),
        "--no-pdf-header-footer".into(),
        format!("--user-data-dir={}", profile.display()),
        format!("--print-to-pdf={}", output.display()),
        format!("file://{}", input.display()),
    ]
}

impl PdfEngine for ChromiumEngine {
    fn name(&self) -> &str {
        "chromium"
    }

    fn attempt<'a>(&'a self, request: &'a RenderRequest) -> BoxFuture<'a, Result<Vec<u8>, EngineError>> {
        Box::pin(async move {
            let program = self.program()?;
            run_session(
                "chromium",
                &program,
                &request.html,
                |input, output| {
                    let profile = input.with_file_name("profile");
                    chromium_args(input, output, &profile)
                },
                self.timeout,
            )
            .await
        })
    }
}

// ── wkhtmltopdf ──────────────────────────────────────────────────────────

/// QtWebKit-based `wkhtmltopdf`.
#[derive(Debug, Clone)]
pub struct WebKitEngine {
    pub executable: Option<PathBuf>,
    pub timeout: Duration,
    pub page_size: PageSize,
    pub margin_mm: u32,
}

impl WebKitEngine {
    pub fn from_config(config: &DocGenConfig) -> Self {
        Self {
            executable: config.wkhtmltopdf_path.clone(),
            timeout: Duration::from_secs(config.render_timeout_secs),
            page_size: config.page_size,
            margin_mm: config.margin_mm,
        }
    }
}

/// Arguments for one wkhtmltopdf run.
pub fn wkhtmltopdf_args(input: &Path, output: &Path, page_size: PageSize, margin_mm: u32) -> Vec<String> {
    let margin = format!("{margin_mm}mm");
    let mut args: Vec<String> = vec!["--quiet".into(), "--page-size".into(), page_size.css_name().into()];
    for side in ["--margin-top", "--margin-right", "--margin-bottom", "--margin-left"] {
        args.push(side.into());
        args.push(margin.clone());
    }
    args.extend([
        "--print-media-type".into(),
        "--encoding".into(),
        "utf-8".into(),
        input.display().to_string(),
        output.display().to_string(),
    ]);
    args
}

impl PdfEngine for WebKitEngine {
    fn name(&self) -> &str {
        "wkhtmltopdf"
    }

    fn attempt<'a>(&'a self, request: &'a RenderRequest) -> BoxFuture<'a, Result<Vec<u8>, EngineError>> {
        Box::pin(async move {
            let program = self
                .executable
                .clone()
                .or_else(|| find_executable(&["wkhtmltopdf"]))
                .ok_or_else(|| EngineError::NotFound {
                    program: "wkhtmltopdf".into(),
                })?;
            run_session(
                "wkhtmltopdf",
                &program,
                &request.html,
                |input, output| wkhtmltopdf_args(input, output, self.page_size, self.margin_mm),
                self.timeout,
            )
            .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromium_args_print_to_pdf() {
        let args = chromium_args(Path::new("/t/in.html"), Path::new("/t/out.pdf"), Path::new("/t/p"));
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--print-to-pdf=/t/out.pdf".to_string()));
        assert_eq!(args.last().unwrap(), "file:///t/in.html");
    }

    #[test]
    fn wkhtmltopdf_args_carry_geometry() {
        let args = wkhtmltopdf_args(Path::new("in.html"), Path::new("out.pdf"), PageSize::A4, 25);
        assert_eq!(&args[..3], &["--quiet", "--page-size", "A4"]);
        assert_eq!(args.iter().filter(|a| *a == "25mm").count(), 4);
        assert_eq!(&args[args.len() - 2..], &["in.html", "out.pdf"]);
    }

    #[test]
    fn missing_executable_is_not_found() {
        let engine = ChromiumEngine {
            executable: Some(PathBuf::from("/definitely/not/here/chromium")),
            timeout: Duration::from_secs(5),
        };
        let req = RenderRequest::from_html("<p>x</p>");
        let err = tokio_test::block_on(engine.attempt(&req)).unwrap_err();
        assert!(err.is_missing_native_library(), "{err}");
        assert_eq!(open_browser_sessions(), 0);
    }
}
