//! Regression Error Handling
//!
//! Every fatal condition the pipeline can hit is a [`RegressError`] value.
//! Library code only returns these; the binary is the single place that
//! renders them (through `miette`) and decides to terminate.

use std::{fmt, io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RegressError>;

/// Which profile collection a tool lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// RTL simulator that builds and runs the instruction generator.
    Simulator,
    /// Instruction-set simulator used as a reference model.
    Iss,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Simulator => "RTL simulator",
            ToolKind::Iss => "ISS",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ERROR TYPE
// ============================================================================

#[derive(Error, Diagnostic, Debug)]
pub enum RegressError {
    // Configuration errors
    #[error("cannot find {kind} `{name}`")]
    #[diagnostic(code(regress::config::unknown_tool))]
    UnknownTool {
        kind: ToolKind,
        name: String,
        #[help]
        help: Option<String>,
    },

    #[error("environment variable `{name}` is not set")]
    #[diagnostic(
        code(regress::config::missing_env),
        help("export the variable before running the regression")
    )]
    MissingEnvVar { name: String },

    #[error("cannot find test `{test}` in {}", .testlist.display())]
    #[diagnostic(code(regress::config::no_matching_tests))]
    NoMatchingTests { test: String, testlist: PathBuf },

    #[error("unknown step `{step}`")]
    #[diagnostic(
        code(regress::config::unknown_step),
        help("valid steps: all, gen, gcc_compile, iss_sim, iss_cmp")
    )]
    UnknownStep { step: String },

    #[error("failed to parse YAML in {}", .path.display())]
    #[diagnostic(code(regress::config::yaml))]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("command template is empty: {template:?}")]
    #[diagnostic(code(regress::config::empty_command))]
    EmptyCommand { template: String },

    #[error("invalid CSR description for `{csr}`: {reason}")]
    #[diagnostic(code(regress::config::csr))]
    InvalidCsrDescription { csr: String, reason: String },

    // Generator errors
    #[error("building the instruction generator failed (exit {}): {command}", fmt_code(.code))]
    #[diagnostic(code(regress::gen::build))]
    GeneratorBuild {
        command: String,
        code: Option<i32>,
        #[help]
        output: Option<String>,
    },

    #[error("instruction generator failed for `{test}` (exit {})", fmt_code(.code))]
    #[diagnostic(code(regress::gen::run))]
    GeneratorRun {
        test: String,
        code: Option<i32>,
        #[help]
        output: Option<String>,
    },

    #[error("instruction generator timed out after {seconds}s for `{test}`")]
    #[diagnostic(code(regress::gen::timeout))]
    GeneratorTimeout {
        test: String,
        seconds: u64,
        #[help]
        output: Option<String>,
    },

    // Toolchain errors
    #[error("{step} failed for {} (exit {})", .input.display(), fmt_code(.code))]
    #[diagnostic(code(regress::toolchain::failed))]
    Toolchain {
        step: &'static str,
        input: PathBuf,
        code: Option<i32>,
        #[help]
        output: Option<String>,
    },

    // Plumbing
    #[error("failed to launch `{program}`")]
    #[diagnostic(code(regress::process::spawn))]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}")]
    #[diagnostic(code(regress::io))]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl RegressError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        RegressError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn unknown_tool(kind: ToolKind, name: &str, available: &[&str]) -> Self {
        let help = if available.is_empty() {
            None
        } else {
            Some(format!("configured entries: {}", available.join(", ")))
        };
        RegressError::UnknownTool {
            kind,
            name: name.to_string(),
            help,
        }
    }
}

/// Wraps captured tool output for display under a diagnostic.
pub fn captured_output(output: &str) -> Option<String> {
    let trimmed = output.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("tool output:\n{trimmed}"))
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
