//! External engines: locate them and run them over in-memory buffers.
//!
//! tesseract, wkhtmltopdf and pandoc all read their input from stdin and
//! write their result to stdout, so no intermediate file is ever created.
//! The child's stdin is fed from a scoped thread while stdout/stderr are
//! drained, which keeps large inputs from deadlocking on a full pipe.

use crate::config::ConversionConfig;
use crate::error::DocpipeError;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Static description of an external command-line engine.
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    /// Executable name looked up on `PATH`.
    pub name: &'static str,
    /// Environment variable holding an explicit path.
    pub env_var: &'static str,
    /// Install hint shown when the engine cannot be found.
    pub hint: &'static str,
}

pub const TESSERACT: Engine = Engine {
    name: "tesseract",
    env_var: "DOCPIPE_TESSERACT",
    hint: "install tesseract-ocr (e.g. `apt-get install tesseract-ocr`) or pass --tesseract",
};

pub const WKHTMLTOPDF: Engine = Engine {
    name: "wkhtmltopdf",
    env_var: "DOCPIPE_WKHTMLTOPDF",
    hint: "install wkhtmltopdf (e.g. `apt-get install wkhtmltopdf`) or pass --wkhtmltopdf",
};

pub const PANDOC: Engine = Engine {
    name: "pandoc",
    env_var: "DOCPIPE_PANDOC",
    hint: "install pandoc (https://pandoc.org/installing.html) or pass --pandoc",
};

impl Engine {
    fn unavailable(&self, reason: impl std::fmt::Display) -> DocpipeError {
        DocpipeError::EngineUnavailable {
            engine: self.name.to_string(),
            hint: format!("{reason}\n{}", self.hint),
        }
    }

    /// Resolve the executable: explicit path, then `env_var`, then `PATH`.
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<PathBuf, DocpipeError> {
        let configured = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(self.env_var).map(PathBuf::from));

        if let Some(path) = configured {
            return if path.is_file() {
                Ok(path)
            } else {
                Err(self.unavailable(format!("'{}' does not exist", path.display())))
            };
        }

        which::which(self.name).map_err(|e| self.unavailable(format!("not found on PATH ({e})")))
    }

    /// Run the engine with `args`, piping `input` to stdin and collecting output.
    ///
    /// Only spawn failures are errors here; a non-zero exit status is left to
    /// the caller, which knows how to word it.
    pub fn run(&self, program: &Path, args: &[&str], input: &[u8]) -> Result<Output, DocpipeError> {
        debug!("Running {} {:?} ({} bytes on stdin)", program.display(), args, input.len());

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(format!("failed to start '{}': {e}", program.display())))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DocpipeError::Internal(format!("{}: stdin not captured", self.name)))?;

        let output = std::thread::scope(|scope| {
            scope.spawn(move || {
                // A broken pipe here means the engine exited early; its
                // stderr and exit status carry the real reason.
                let _ = stdin.write_all(input);
            });
            child.wait_with_output()
        })
        .map_err(|e| DocpipeError::Internal(format!("{}: {e}", self.name)))?;

        debug!(
            "{} exited with {} ({} bytes on stdout)",
            self.name,
            output.status,
            output.stdout.len()
        );
        Ok(output)
    }
}

/// The engine's stderr, trimmed, or its exit status when stderr is empty.
pub fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

/// Availability report for one engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub engine: &'static str,
    pub location: Option<PathBuf>,
    pub error: Option<String>,
}

/// Check every engine the pipeline may call.
pub fn engine_status(config: &ConversionConfig) -> Vec<EngineStatus> {
    let cli = [
        (TESSERACT, config.tesseract_path.as_deref()),
        (WKHTMLTOPDF, config.wkhtmltopdf_path.as_deref()),
        (PANDOC, config.pandoc_path.as_deref()),
    ];
    let mut report: Vec<EngineStatus> = cli
        .into_iter()
        .map(|(engine, explicit)| match engine.resolve(explicit) {
            Ok(path) => EngineStatus {
                engine: engine.name,
                location: Some(path),
                error: None,
            },
            Err(e) => EngineStatus {
                engine: engine.name,
                location: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    report.push(match crate::pipeline::extract::pdf::bind_pdfium(config) {
        Ok(_) => EngineStatus {
            engine: "pdfium",
            location: crate::pipeline::extract::pdf::configured_library_path(config),
            error: None,
        },
        Err(e) => EngineStatus {
            engine: "pdfium",
            location: None,
            error: Some(e.to_string()),
        },
    });
    report
}
