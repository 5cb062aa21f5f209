//! Handles all user-facing output for the CLI.
//!
//! Progress goes through `tracing`; this module owns what is printed
//! directly: the logging setup, the final summary and fatal errors.

use std::{io::Write, path::Path};

use miette::Report;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::{report::Summary, RegressError};

/// Installs the global `tracing` subscriber. Verbose runs log at DEBUG.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Prints the pass/fail totals of a comparison run.
pub fn print_summary(summary: &Summary, report: &Path) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = write!(stdout, "{} PASSED", summary.passed);
    let _ = stdout.reset();
    let _ = write!(stdout, ", ");
    let failed_color = if summary.failed > 0 {
        Color::Red
    } else {
        Color::Green
    };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(failed_color)).set_bold(true));
    let _ = write!(stdout, "{} FAILED", summary.failed);
    let _ = stdout.reset();
    let _ = writeln!(stdout);
    let _ = writeln!(stdout, "ISS regression report is saved to {}", report.display());
}

/// Renders a fatal error with its diagnostic code and help.
pub fn print_error(error: RegressError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}
