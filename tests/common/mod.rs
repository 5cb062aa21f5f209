//! Shared fixtures for the pipeline integration tests: a scratch workspace
//! with YAML profiles, and a runner that records invocations instead of
//! spawning processes.

#![allow(dead_code)]

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use riscv_regress::{
    config::{Environment, PipelineContext, Seed},
    pipeline::{GeneratorOptions, RunPlan, StageSet},
    process::{Completion, Invocation, OutputTarget, Runner},
    Result,
};
use tempfile::TempDir;

pub const TESTLIST: &str = r#"
- test: t0
  uvm_test: riscv_instr_base_test
  iterations: 2
- test: riscv_rand_jump_test
  uvm_test: riscv_rand_jump_test
  iterations: 1
- test: riscv_disabled_test
  uvm_test: riscv_instr_base_test
  iterations: 0
"#;

pub const SIMULATOR_YAML: &str = r#"
- tool: vcs
  compile_cmd:
    - "vcs -file <cwd>/vcs.compile.option.f -f <cwd>/files.f -full64 -l <out>/compile.log -o <out>/vcs_simv"
    - "touch <out>/vcs_simv.built"
  sim_cmd: >
    <out>/vcs_simv +vcs+lic+wait
"#;

pub const ISS_YAML: &str = r#"
- iss: spike
  path_var: RISCV_SPIKE
  cmd: >
    <path_var> --isa=<variant> -l <elf>
- iss: ovpsim
  path_var: OVPSIM_PATH
  cmd: >
    <path_var>/riscvOVPsim.exe
    --variant <variant>
    --program <elf>
"#;

/// Scratch directories plus configuration files.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("root").join("yaml");
        fs::create_dir_all(&yaml).unwrap();
        fs::write(yaml.join("testlist.yaml"), TESTLIST).unwrap();
        fs::write(yaml.join("simulator.yaml"), SIMULATOR_YAML).unwrap();
        fs::write(yaml.join("iss.yaml"), ISS_YAML).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn context(&self) -> PipelineContext {
        PipelineContext::new(self.out(), self.root()).isa("rv64imc").abi("lp64")
    }

    pub fn plan(&self, steps: &str, test: &str, iss: &str) -> RunPlan {
        let yaml = self.root().join("yaml");
        RunPlan {
            steps: steps.parse::<StageSet>().unwrap(),
            testlist: yaml.join("testlist.yaml"),
            test: test.to_string(),
            iterations: 0,
            generator: GeneratorOptions {
                seed: Seed::Fixed(42),
                ..GeneratorOptions::default()
            },
            simulator_yaml: yaml.join("simulator.yaml"),
            iss: iss.to_string(),
            iss_yaml: yaml.join("iss.yaml"),
        }
    }
}

pub fn toolchain_env() -> Environment {
    Environment::default()
        .with("RISCV_GCC", "riscv64-unknown-elf-gcc")
        .with("RISCV_OBJCOPY", "riscv64-unknown-elf-objcopy")
        .with("RISCV_SPIKE", "/opt/spike/bin/spike")
        .with("OVPSIM_PATH", "/opt/ovpsim/bin")
}

type Script = Box<dyn FnMut(&Invocation) -> Result<Completion>>;

/// Records every invocation and answers from a script. By default every
/// call succeeds and `iss_cmp` reports a pass.
pub struct RecordingRunner {
    pub calls: Vec<Invocation>,
    script: Script,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::scripted(|inv| {
            if is_compare(inv) {
                append_to_target(inv, "[PASSED]: logs match");
            }
            Ok(Completion::exited(0))
        })
    }

    pub fn scripted(script: impl FnMut(&Invocation) -> Result<Completion> + 'static) -> Self {
        Self {
            calls: Vec::new(),
            script: Box::new(script),
        }
    }

    pub fn programs(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.program.as_str()).collect()
    }

    pub fn calls_to(&self, program_suffix: &str) -> Vec<&Invocation> {
        self.calls
            .iter()
            .filter(|c| c.program.ends_with(program_suffix))
            .collect()
    }
}

impl Runner for RecordingRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<Completion> {
        self.calls.push(invocation.clone());
        (self.script)(invocation)
    }
}

pub fn is_compare(inv: &Invocation) -> bool {
    inv.program.ends_with("iss_cmp")
}

/// Writes `line` to the file an invocation's output is redirected to, the
/// way the real tool's output would land there.
pub fn append_to_target(inv: &Invocation, line: &str) {
    let path = match &inv.output {
        OutputTarget::Append(path) | OutputTarget::Truncate(path) => path,
        OutputTarget::Capture => return,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    writeln!(file, "{line}").unwrap();
}

pub fn arg_with_prefix<'a>(inv: &'a Invocation, prefix: &str) -> Option<&'a str> {
    inv.args
        .iter()
        .find(|a| a.starts_with(prefix))
        .map(|a| &a[prefix.len()..])
}

pub fn path_str(path: &Path) -> String {
    path.display().to_string()
}
