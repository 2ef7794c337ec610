//! Token stream → source text.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use proc_macro2::TokenStream;

use crate::error::CompileError;

pub trait Formatter {
    fn format(&self, tokens: TokenStream) -> Result<String, CompileError>;
}

/// In-process formatting through `syn` + `prettyplease`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyPlease;

impl Formatter for PrettyPlease {
    fn format(&self, tokens: TokenStream) -> Result<String, CompileError> {
        let file = syn::parse2::<syn::File>(tokens).map_err(|e| {
            CompileError::FormatterFailure(format!("generated code does not parse: {e}"))
        })?;
        Ok(prettyplease::unparse(&file))
    }
}

/// Pipes the unformatted source through an external stdin → stdout command.
#[derive(Debug, Clone)]
pub struct ExternalFormatter {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalFormatter {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn rustfmt() -> Self {
        Self::new("rustfmt", &["--edition", "2021"])
    }

    fn failure(&self, what: impl std::fmt::Display) -> CompileError {
        CompileError::FormatterFailure(format!("`{}`: {what}", self.program))
    }
}

impl Formatter for ExternalFormatter {
    fn format(&self, tokens: TokenStream) -> Result<String, CompileError> {
        log::debug!("formatting with `{} {}`", self.program, self.args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(format!("failed to start: {e}")))?;

        // Feed stdin from a separate thread so a full stdout pipe cannot
        // deadlock the child.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.failure("stdin not captured"))?;
        let source = tokens.to_string();
        let writer = thread::spawn(move || stdin.write_all(source.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| self.failure(format!("wait failed: {e}")))?;
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.failure(format!("writing input failed: {e}"))),
            Err(_) => return Err(self.failure("input writer panicked")),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!("exited with {}: {}", output.status, stderr.trim())));
        }
        let formatted = String::from_utf8(output.stdout)
            .map_err(|e| self.failure(format!("output is not UTF-8: {e}")))?;
        Ok(formatted)
    }
}
