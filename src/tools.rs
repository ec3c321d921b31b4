//! External programs this crate delegates to.
//!
//! Decryption and PDF layout are not implemented here; they are done by
//! separate tools behind the [`ExternalConverter`] trait so the rest of the
//! crate never spawns processes directly.

use crate::{EbookError, Result};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Turns one input file into a new output file inside `out_dir`.
pub trait ExternalConverter {
    /// Short tool name for logs and errors.
    fn name(&self) -> &str;

    /// Run the conversion and return the path of the produced file.
    fn run(&self, input: &Path, out_dir: &Path) -> Result<PathBuf>;
}

// ── K2pdfopt ──────────────────────────────────────────────────────────────────

const K2PDFOPT_INSTALL: &str =
    "To install k2pdfopt, go to https://willus.org/k2pdfopt/download and install it globally.";

/// Reflows PDFs for a 1264x1680 e-reader screen with `k2pdfopt`.
#[derive(Debug, Clone)]
pub struct K2pdfopt {
    program: PathBuf,
}

impl Default for K2pdfopt {
    fn default() -> Self {
        Self::new("k2pdfopt")
    }
}

impl K2pdfopt {
    pub const OUTPUT_NAME: &'static str = "post_reformat_pdf_k2pdfopt.pdf";

    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Fail with [`EbookError::ToolNotFound`] unless the binary can be started.
    pub fn ensure_available(&self) -> Result<()> {
        let spawned = Command::new(&self.program)
            .arg("-h")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match spawned {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(EbookError::ToolNotFound {
                tool: self.program.display().to_string(),
                instructions: K2PDFOPT_INSTALL.into(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// `-om` output margin, `-ds` document scale, `-w`/`-h` reader size.
    pub fn arguments(input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-om", "0.1", "-ds", "0.5", "-w", "1264", "-h", "1680", "-o"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(output.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }
}

impl ExternalConverter for K2pdfopt {
    fn name(&self) -> &str {
        "k2pdfopt"
    }

    fn run(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let output = out_dir.join(Self::OUTPUT_NAME);
        // stdin must not be a terminal or k2pdfopt enters its interactive menu
        let mut command = Command::new(&self.program);
        command
            .args(Self::arguments(input, &output))
            .stdin(Stdio::null());
        run_command(self.name(), command, &output)?;
        log::debug!("Reformatted {} with k2pdfopt to {}", input.display(), output.display());
        Ok(output)
    }
}

// ── CommandConverter ──────────────────────────────────────────────────────────

/// A user-configured command line, e.g. a DRM removal script.
///
/// Arguments may contain the placeholders `{input}`, `{output}` and `{key}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    output_name: String,
    key: Option<PathBuf>,
}

impl CommandConverter {
    /// Build from a `[program, args...]` template; `None` when it is empty.
    pub fn from_template(template: &[String], output_name: impl Into<String>) -> Option<Self> {
        let (program, args) = template.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            output_name: output_name.into(),
            key: None,
        })
    }

    /// Substitute `key` for `{key}`.
    pub fn with_key(mut self, key: impl Into<PathBuf>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The arguments after placeholder substitution.
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<String> {
        let key = self
            .key
            .as_deref()
            .map(|k| k.display().to_string())
            .unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.display().to_string())
                    .replace("{output}", &output.display().to_string())
                    .replace("{key}", &key)
            })
            .collect()
    }
}

impl ExternalConverter for CommandConverter {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let output = out_dir.join(&self.output_name);
        let mut command = Command::new(&self.program);
        command
            .args(self.arguments(input, &output))
            .stdin(Stdio::null());
        run_command(self.name(), command, &output)?;
        Ok(output)
    }
}

fn run_command(tool: &str, mut command: Command, output: &Path) -> Result<()> {
    log::debug!("Running {command:?}");
    let status = command.status().map_err(|e| match e.kind() {
        ErrorKind::NotFound => EbookError::ToolNotFound {
            tool: tool.to_string(),
            instructions: "Make sure it is installed and on PATH.".into(),
        },
        _ => EbookError::IoError(e),
    })?;

    if !status.success() {
        return Err(EbookError::ToolFailed {
            tool: tool.to_string(),
            status: status.to_string(),
        });
    }
    if !output.exists() {
        return Err(EbookError::ToolFailed {
            tool: tool.to_string(),
            status: format!("no output written to {}", output.display()),
        });
    }
    Ok(())
}
