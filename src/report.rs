//! The cumulative ISS comparison report and its pass/fail summary.

use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{RegressError, Result};

pub const PASSED: &str = "PASSED";
pub const FAILED: &str = "FAILED";

/// Matches the summary lines this module appends, so a rerun does not count
/// them as results.
static SUMMARY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+ PASSED, \d+ FAILED\s*$").expect("summary pattern"));

/// Pass/fail totals of one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    /// Counts marker lines in `text`, skipping previously appended summaries.
    pub fn count(text: &str) -> Self {
        let mut summary = Summary::default();
        for line in text.lines() {
            if SUMMARY_LINE.is_match(line) {
                continue;
            }
            if line.contains(PASSED) {
                summary.passed += 1;
            }
            if line.contains(FAILED) {
                summary.failed += 1;
            }
        }
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {PASSED}, {} {FAILED}", self.passed, self.failed)
    }
}

/// Handle on the report file for one compare stage.
#[derive(Debug)]
pub struct ComparisonReport {
    path: PathBuf,
}

impl ComparisonReport {
    /// Starts a fresh report, discarding anything from earlier runs.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        File::create(&path)
            .map_err(|e| RegressError::io(format!("failed to create {}", path.display()), e))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the label that precedes each comparison entry.
    pub fn record_binary(&self, elf: &Path) -> Result<()> {
        self.append_line(&format!("Test binary: {}", elf.display()))
    }

    pub fn append_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RegressError::io(format!("failed to open {}", self.path.display()), e))?;
        writeln!(file, "{line}")
            .map_err(|e| RegressError::io(format!("failed to write {}", self.path.display()), e))
    }

    /// Closes the report with its summary line.
    pub fn finish(self) -> Result<Summary> {
        summarize(&self.path)
    }
}

/// Counts the results in the report at `path` and appends the summary line.
pub fn summarize(path: &Path) -> Result<Summary> {
    let text = fs::read_to_string(path)
        .map_err(|e| RegressError::io(format!("failed to read {}", path.display()), e))?;
    let summary = Summary::count(&text);
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| RegressError::io(format!("failed to open {}", path.display()), e))?;
    if !text.is_empty() && !text.ends_with('\n') {
        writeln!(file).map_err(|e| RegressError::io(format!("failed to write {}", path.display()), e))?;
    }
    writeln!(file, "{summary}")
        .map_err(|e| RegressError::io(format!("failed to write {}", path.display()), e))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_markers() {
        let text = "Test binary: a.o\n[PASSED]: 120 matched\nTest binary: b.o\n[FAILED]: 3 mismatch\nTest binary: c.o\n[PASSED]: 98 matched\n";
        assert_eq!(Summary::count(text), Summary { passed: 2, failed: 1 });
    }

    #[test]
    fn test_summary_format() {
        let summary = Summary { passed: 4, failed: 0 };
        assert_eq!(summary.to_string(), "4 PASSED, 0 FAILED");
    }

    #[test]
    fn test_summarize_appends_and_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iss_regr.log");
        fs::write(&path, "[PASSED]\n[PASSED]\n[FAILED]").unwrap();

        let first = summarize(&path).unwrap();
        assert_eq!(first, Summary { passed: 2, failed: 1 });

        let second = summarize(&path).unwrap();
        assert_eq!(second, first);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["[PASSED]", "[PASSED]", "[FAILED]", "2 PASSED, 1 FAILED", "2 PASSED, 1 FAILED"]
        );
    }

    #[test]
    fn test_report_records_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iss_regr.log");
        fs::write(&path, "stale\n").unwrap();

        let report = ComparisonReport::create(&path).unwrap();
        report.record_binary(Path::new("out/asm_tests/t0.0.o")).unwrap();
        report.append_line("[PASSED]: 10 instructions").unwrap();
        let summary = report.finish().unwrap();

        assert_eq!(summary, Summary { passed: 1, failed: 0 });
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Test binary: out/asm_tests/t0.0.o\n[PASSED]: 10 instructions\n1 PASSED, 0 FAILED\n"
        );
    }
}
