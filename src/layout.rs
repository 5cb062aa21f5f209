//! Output directory naming shared by every stage.
//!
//! Each stage finds the previous stage's artifacts only through these
//! functions, so compile, simulate and compare always agree on
//! `<test>.<iteration>` naming.

use std::path::{Path, PathBuf};

const ASM_DIR: &str = "asm_tests";
const REPORT: &str = "iss_regr.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<out>/asm_tests`
    pub fn asm_dir(&self) -> PathBuf {
        self.root.join(ASM_DIR)
    }

    /// Base name the generator appends `.<i>.S` to.
    pub fn asm_base(&self, test: &str) -> PathBuf {
        self.asm_dir().join(test)
    }

    pub fn source(&self, test: &str, iteration: u32) -> PathBuf {
        self.artifact(test, iteration, "S")
    }

    pub fn object(&self, test: &str, iteration: u32) -> PathBuf {
        self.artifact(test, iteration, "o")
    }

    pub fn binary(&self, test: &str, iteration: u32) -> PathBuf {
        self.artifact(test, iteration, "bin")
    }

    /// `<out>/sim_<test>.log`
    pub fn generator_log(&self, test: &str) -> PathBuf {
        self.root.join(format!("sim_{test}.log"))
    }

    /// `<out>/<iss>_sim`
    pub fn iss_log_dir(&self, iss: &str) -> PathBuf {
        self.root.join(format!("{iss}_sim"))
    }

    pub fn iss_log(&self, iss: &str, test: &str, iteration: u32) -> PathBuf {
        self.iss_log_dir(iss).join(format!("{test}.{iteration}.log"))
    }

    /// `<out>/iss_regr.log`
    pub fn report(&self) -> PathBuf {
        self.root.join(REPORT)
    }

    fn artifact(&self, test: &str, iteration: u32, extension: &str) -> PathBuf {
        self.asm_dir().join(format!("{test}.{iteration}.{extension}"))
    }
}
