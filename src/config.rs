//! Run configuration: the shared pipeline context, the captured process
//! environment, seed policy and YAML loading.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

use crate::errors::{RegressError, Result};

/// Environment variable naming the cross compiler.
pub const RISCV_GCC: &str = "RISCV_GCC";
/// Environment variable naming the objcopy used to produce raw binaries.
pub const RISCV_OBJCOPY: &str = "RISCV_OBJCOPY";

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// A snapshot of environment variables, captured once at startup and passed
/// to whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Keeps the entries whose name and value are valid UTF-8. Commands are
    /// built from `String`s, so other values could never be substituted.
    pub fn from_os_vars<I: IntoIterator<Item = (OsString, OsString)>>(vars: I) -> Self {
        vars.into_iter()
            .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    let name = name.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
                    tracing::debug!(name = %name, "skipping environment variable that is not UTF-8");
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Looks up a variable the run cannot proceed without.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| RegressError::MissingEnvVar {
            name: name.to_string(),
        })
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// PIPELINE CONTEXT
// ============================================================================

/// Read-only settings shared by every stage.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub output_dir: PathBuf,
    /// Directory holding `scripts/link.ld`, the `iss_cmp` utility and the
    /// generator sources.
    pub working_dir: PathBuf,
    pub isa: String,
    pub abi: String,
    pub verbose: bool,
}

impl PipelineContext {
    pub fn new(output_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            working_dir: working_dir.into(),
            isa: "rv64imc".to_string(),
            abi: "lp64".to_string(),
            verbose: false,
        }
    }

    pub fn isa(mut self, isa: impl Into<String>) -> Self {
        self.isa = isa.into();
        self
    }

    pub fn abi(mut self, abi: impl Into<String>) -> Self {
        self.abi = abi.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// ============================================================================
// SEED POLICY
// ============================================================================

/// How the generator seed is chosen for each test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    Fixed(u64),
    /// Draw a fresh 32-bit seed per test case.
    Random,
}

impl From<i64> for Seed {
    fn from(value: i64) -> Self {
        if value < 0 {
            Seed::Random
        } else {
            Seed::Fixed(value as u64)
        }
    }
}

// ============================================================================
// YAML LOADING
// ============================================================================

/// Reads and deserializes a YAML file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| RegressError::io(format!("failed to read {}", path.display()), e))?;
    serde_yaml::from_str(&content).map_err(|source| RegressError::InvalidYaml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_missing_variable() {
        let env = Environment::default().with("RISCV_GCC", "riscv64-unknown-elf-gcc");
        assert_eq!(env.require("RISCV_GCC").unwrap(), "riscv64-unknown-elf-gcc");
        let err = env.require("RISCV_OBJCOPY").unwrap_err();
        assert!(matches!(err, RegressError::MissingEnvVar { ref name } if name == "RISCV_OBJCOPY"));
    }

    #[test]
    fn test_from_process_captures_variables() {
        let env = Environment::from_process();
        let path = std::env::var("PATH").ok();
        assert_eq!(env.get("PATH"), path.as_deref());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let env = Environment::from_os_vars([
            (OsString::from("RISCV_GCC"), OsString::from("riscv64-unknown-elf-gcc")),
            (OsString::from("LANG_BYTES"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![b'X', 0xff]), OsString::from("value")),
        ]);
        assert_eq!(env.get("RISCV_GCC"), Some("riscv64-unknown-elf-gcc"));
        assert!(env.get("LANG_BYTES").is_none());
        assert!(matches!(env.require("LANG_BYTES"), Err(RegressError::MissingEnvVar { .. })));
    }

    #[test]
    fn test_seed_from_signed() {
        assert_eq!(Seed::from(-1), Seed::Random);
        assert_eq!(Seed::from(0), Seed::Fixed(0));
        assert_eq!(Seed::from(1234), Seed::Fixed(1234));
    }

    #[test]
    fn test_load_yaml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        fs::write(&path, "- test: [unclosed").unwrap();
        let err = load_yaml::<Vec<BTreeMap<String, String>>>(&path).unwrap_err();
        assert!(err.to_string().contains("broken.yaml"));
    }
}
