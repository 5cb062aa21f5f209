//! Test list loading and selection.

use std::path::Path;

use serde::Deserialize;

use crate::{config::load_yaml, errors::Result};

/// Request name that selects the whole catalog.
pub const ALL: &str = "all";

/// One entry of the regression test list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    #[serde(rename = "test")]
    pub name: String,
    /// Test name handed to the generator (`+UVM_TESTNAME`).
    #[serde(rename = "uvm_test")]
    pub target: String,
    pub iterations: u32,
}

impl TestCase {
    pub fn new(name: impl Into<String>, target: impl Into<String>, iterations: u32) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            iterations,
        }
    }
}

pub fn load_test_list(path: &Path) -> Result<Vec<TestCase>> {
    load_yaml(path)
}

/// Picks the tests to run from `catalog`.
///
/// `request` is either [`ALL`] or an exact test name. A positive
/// `iterations_override` replaces the iteration count of every selected
/// entry. An empty result is returned as-is; the caller decides whether
/// that is fatal.
pub fn select(catalog: &[TestCase], request: &str, iterations_override: u32) -> Vec<TestCase> {
    let mut selected = Vec::new();
    for entry in catalog {
        if request != ALL && entry.name != request {
            continue;
        }
        let mut test = entry.clone();
        if iterations_override > 0 {
            test.iterations = iterations_override;
        }
        tracing::info!(test = %test.name, iterations = test.iterations, "found matched test");
        selected.push(test);
        if request != ALL {
            break;
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<TestCase> {
        vec![
            TestCase::new("riscv_arithmetic_basic_test", "riscv_instr_base_test", 2),
            TestCase::new("riscv_machine_mode_rand_test", "riscv_instr_base_test", 0),
            TestCase::new("riscv_rand_jump_test", "riscv_rand_jump_test", 5),
        ]
    }

    #[test]
    fn test_select_all_keeps_order() {
        let selected = select(&catalog(), ALL, 0);
        let names: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "riscv_arithmetic_basic_test",
                "riscv_machine_mode_rand_test",
                "riscv_rand_jump_test"
            ]
        );
        assert_eq!(selected, catalog());
    }

    #[test]
    fn test_select_by_name() {
        let selected = select(&catalog(), "riscv_rand_jump_test", 0);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].iterations, 5);
    }

    #[test]
    fn test_select_absent_is_empty() {
        assert!(select(&catalog(), "riscv_no_such_test", 3).is_empty());
    }

    #[test]
    fn test_override_applies_to_every_entry() {
        let selected = select(&catalog(), ALL, 7);
        assert!(selected.iter().all(|t| t.iterations == 7));
    }

    #[test]
    fn test_zero_override_is_ignored() {
        let selected = select(&catalog(), "riscv_arithmetic_basic_test", 0);
        assert_eq!(selected[0].iterations, 2);
    }

    #[test]
    fn test_parse_test_list() {
        let yaml = r#"
- test: riscv_arithmetic_basic_test
  uvm_test: riscv_instr_base_test
  iterations: 2
- test: riscv_rand_instr_test
  uvm_test: riscv_rand_instr_test
  iterations: 10
"#;
        let list: Vec<TestCase> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(list[1], TestCase::new("riscv_rand_instr_test", "riscv_rand_instr_test", 10));
    }
}
