//! Command template resolution.
//!
//! Tool profiles describe their commands as strings with `<name>`
//! placeholders. Resolution is a single textual pass: a substituted value is
//! never scanned again, and placeholders without a binding are left as-is.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::errors::{RegressError, Result};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)>").expect("placeholder pattern"));

/// The ISS whose command line expects an upper-cased ISA variant.
pub const OVPSIM: &str = "ovpsim";

/// Placeholders understood by the bundled tool profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placeholder {
    /// Output directory of the run.
    Out,
    /// Working directory holding the generator sources and helper scripts.
    Cwd,
    /// Object file handed to an ISS.
    Elf,
    /// Log file of an invocation.
    Log,
    /// ISA variant string.
    Variant,
    /// Value of the environment variable named by an ISS profile.
    PathVar,
}

impl Placeholder {
    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Out => "out",
            Placeholder::Cwd => "cwd",
            Placeholder::Elf => "elf",
            Placeholder::Log => "log",
            Placeholder::Variant => "variant",
            Placeholder::PathVar => "path_var",
        }
    }
}

/// Placeholder name to replacement value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(placeholder.name().to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Substitutes every bound placeholder in `template`.
    pub fn resolve(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Splits `template` on whitespace and resolves each word separately, so
    /// a substituted value always stays a single argument.
    pub fn resolve_words(&self, template: &str) -> Result<Vec<String>> {
        let words: Vec<String> = template
            .split_whitespace()
            .map(|word| self.resolve(word))
            .collect();
        if words.is_empty() {
            return Err(RegressError::EmptyCommand {
                template: template.to_string(),
            });
        }
        Ok(words)
    }
}

/// ISA variant as a given tool expects to see it.
pub fn isa_variant(tool: &str, isa: &str) -> String {
    if tool == OVPSIM {
        isa.to_uppercase()
    } else {
        isa.to_string()
    }
}

/// Names of all placeholders still present in `text`.
pub fn unresolved(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_placeholders() {
        let bindings = Bindings::new()
            .bind(Placeholder::Out, "/tmp/out")
            .bind(Placeholder::Cwd, "/opt/dv");
        let resolved = bindings.resolve("vcs -f <cwd>/files.f -o <out>/vcs_simv -l <out>/compile.log");
        assert_eq!(
            resolved,
            "vcs -f /opt/dv/files.f -o /tmp/out/vcs_simv -l /tmp/out/compile.log"
        );
        assert!(unresolved(&resolved).is_empty());
    }

    #[test]
    fn test_unbound_placeholder_left_verbatim() {
        let bindings = Bindings::new().bind(Placeholder::PathVar, "/usr/bin/spike");
        assert_eq!(
            bindings.resolve("<path_var> --isa=<variant> -l <elf>"),
            "/usr/bin/spike --isa=<variant> -l <elf>"
        );
    }

    #[test]
    fn test_substitution_is_not_reentrant() {
        let bindings = Bindings::new()
            .bind(Placeholder::Out, "<cwd>")
            .bind(Placeholder::Cwd, "/opt/dv");
        assert_eq!(bindings.resolve("<out>/x"), "<cwd>/x");
    }

    #[test]
    fn test_resolve_words_keeps_values_whole() {
        let bindings = Bindings::new().bind(Placeholder::Out, "/tmp/my out");
        let words = bindings.resolve_words("  sim\n  -l <out>/sim.log ").unwrap();
        assert_eq!(words, vec!["sim", "-l", "/tmp/my out/sim.log"]);
    }

    #[test]
    fn test_resolve_words_rejects_blank() {
        let result = Bindings::new().resolve_words(" \n ");
        assert!(matches!(result, Err(RegressError::EmptyCommand { .. })));
    }

    #[test]
    fn test_isa_variant_case_rule() {
        assert_eq!(isa_variant("ovpsim", "rv64imc"), "RV64IMC");
        assert_eq!(isa_variant("spike", "rv64imc"), "rv64imc");
        assert_eq!(isa_variant("OVPSIM", "rv32i"), "rv32i");
    }
}
