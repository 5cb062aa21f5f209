//! Defines the command-line arguments and subcommands for the regression CLI.
//!
//! Long option names follow the historical regression script (`--o`,
//! `--simulator_yaml`, `--co`, ...) so existing job scripts keep working.

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::{
    config::Seed,
    csr::Xlen,
    errors::Result,
    pipeline::{GeneratorOptions, RunPlan, StageSet},
};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "regress",
    version,
    about = "Regression driver for the RISC-V random instruction generator."
)]
pub struct RegressArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate, compile, simulate on the ISSs and compare the results.
    Run(RunArgs),
    /// Generate directed CSR tests from a CSR description file.
    CsrTest(CsrTestArgs),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.verbose,
            Command::CsrTest(args) => args.verbose,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Output directory name
    #[arg(long = "o", visible_alias = "output", default_value = "./out")]
    pub output: PathBuf,

    /// Regression testlist [default: <root>/yaml/testlist.yaml]
    #[arg(long)]
    pub testlist: Option<PathBuf>,

    /// RISC-V ISA subset
    #[arg(long, default_value = "rv64imc")]
    pub isa: String,

    /// ABI used for compilation, e.g. ilp32 or lp64
    #[arg(long, default_value = "lp64")]
    pub mabi: String,

    /// Test name, 'all' means all tests in the list
    #[arg(long, default_value = "all")]
    pub test: String,

    /// Randomization seed, negative means a random seed per test
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub seed: i64,

    /// Override the iteration count in the test list
    #[arg(long, default_value_t = 0)]
    pub iterations: u32,

    /// Simulator used to run the generator
    #[arg(long, default_value = "vcs")]
    pub simulator: String,

    /// RTL simulator setting YAML [default: <root>/yaml/simulator.yaml]
    #[arg(long = "simulator_yaml", visible_alias = "simulator-yaml")]
    pub simulator_yaml: Option<PathBuf>,

    /// Comma-separated instruction set simulators, e.g. spike,ovpsim
    #[arg(long, default_value = "spike")]
    pub iss: String,

    /// ISS setting YAML [default: <root>/yaml/iss.yaml]
    #[arg(long = "iss_yaml", visible_alias = "iss-yaml")]
    pub iss_yaml: Option<PathBuf>,

    /// Verbose logging; also accepts 0 or 1
    #[arg(short, long, value_name = "0|1", num_args = 0..=1, default_value = "0",
          default_missing_value = "1", action = ArgAction::Set, value_parser = parse_switch)]
    pub verbose: bool,

    /// Compile the generator only; also accepts 0 or 1
    #[arg(long = "co", value_name = "0|1", num_args = 0..=1, default_value = "0",
          default_missing_value = "1", action = ArgAction::Set, value_parser = parse_switch)]
    pub compile_only: bool,

    /// Simulate the generator only; also accepts 0 or 1
    #[arg(long = "so", value_name = "0|1", num_args = 0..=1, default_value = "0",
          default_missing_value = "1", action = ArgAction::Set, value_parser = parse_switch)]
    pub sim_only: bool,

    /// Run steps: all, or a subset of gen,gcc_compile,iss_sim,iss_cmp
    #[arg(long, default_value = "all")]
    pub steps: String,

    /// Job submission command placed in front of each generator run
    #[arg(long = "lsf_cmd", visible_alias = "lsf-cmd", default_value = "")]
    pub lsf_cmd: String,

    /// Directory holding yaml/, scripts/link.ld and iss_cmp [default: current directory]
    #[arg(long)]
    pub root: Option<PathBuf>,
}

impl RunArgs {
    /// Resolves defaults that depend on `root` into a run plan.
    pub fn plan(&self, root: &Path) -> Result<RunPlan> {
        let yaml = root.join("yaml");
        Ok(RunPlan {
            steps: self.steps.parse::<StageSet>()?,
            testlist: self
                .testlist
                .clone()
                .unwrap_or_else(|| yaml.join("testlist.yaml")),
            test: self.test.clone(),
            iterations: self.iterations,
            generator: GeneratorOptions {
                simulator: self.simulator.clone(),
                compile_only: self.compile_only,
                sim_only: self.sim_only,
                seed: Seed::from(self.seed),
                job_prefix: self.lsf_cmd.split_whitespace().map(String::from).collect(),
            },
            simulator_yaml: self
                .simulator_yaml
                .clone()
                .unwrap_or_else(|| yaml.join("simulator.yaml")),
            iss: self.iss.clone(),
            iss_yaml: self
                .iss_yaml
                .clone()
                .unwrap_or_else(|| yaml.join("iss.yaml")),
        })
    }
}

#[derive(Debug, Args)]
pub struct CsrTestArgs {
    /// YAML file describing every CSR the processor supports
    #[arg(long = "csr_file")]
    pub csr_file: PathBuf,

    /// ISA width: 32, 64 or 128
    #[arg(long, default_value = "32", value_parser = parse_xlen)]
    pub rv: Xlen,

    /// How many tests to generate
    #[arg(long = "num_test", default_value_t = 1)]
    pub num_test: u32,

    /// Output directory
    #[arg(long, default_value = "./")]
    pub out: PathBuf,

    /// Seed for operand and register selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Switches of the historical script take an optional integer: a bare flag
/// or any non-zero value turns them on.
fn parse_switch(s: &str) -> std::result::Result<bool, String> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => s
            .parse::<i64>()
            .map(|value| value != 0)
            .map_err(|_| format!("expected 0 or 1, found `{s}`")),
    }
}

fn parse_xlen(s: &str) -> std::result::Result<Xlen, String> {
    let bits: u32 = s.parse().map_err(|e| format!("{e}"))?;
    Xlen::try_from(bits).map_err(|bits| format!("unsupported ISA width {bits}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;

    #[test]
    fn test_defaults_resolve_against_root() {
        let args = RegressArgs::parse_from(["regress", "run"]);
        let Command::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        let plan = run.plan(Path::new("/opt/riscv-dv")).unwrap();
        assert_eq!(plan.testlist, PathBuf::from("/opt/riscv-dv/yaml/testlist.yaml"));
        assert_eq!(plan.iss_yaml, PathBuf::from("/opt/riscv-dv/yaml/iss.yaml"));
        assert_eq!(plan.test, "all");
        assert_eq!(plan.generator.seed, Seed::Random);
        assert_eq!(plan.steps, StageSet::all());
        assert!(plan.generator.job_prefix.is_empty());
    }

    #[test]
    fn test_historical_flags() {
        let args = RegressArgs::parse_from([
            "regress",
            "run",
            "--o",
            "/tmp/out",
            "--seed",
            "-1",
            "--co",
            "--steps",
            "gen",
            "--lsf_cmd",
            "bsub -Is",
            "--simulator_yaml",
            "sim.yaml",
        ]);
        let Command::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(run.output, PathBuf::from("/tmp/out"));
        assert!(run.compile_only);
        let plan = run.plan(Path::new(".")).unwrap();
        assert_eq!(plan.generator.job_prefix, vec!["bsub", "-Is"]);
        assert_eq!(plan.simulator_yaml, PathBuf::from("sim.yaml"));
        assert_eq!(plan.steps.iter().collect::<Vec<_>>(), vec![Stage::Gen]);
    }

    #[test]
    fn test_hyphenated_aliases() {
        let args = RegressArgs::parse_from(["regress", "run", "--iss-yaml", "iss.yaml", "--lsf-cmd", "bsub"]);
        let Command::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        let plan = run.plan(Path::new(".")).unwrap();
        assert_eq!(plan.iss_yaml, PathBuf::from("iss.yaml"));
        assert_eq!(plan.generator.job_prefix, vec!["bsub"]);
    }

    #[test]
    fn test_switches_accept_integer_values() {
        let parse = |argv: &[&str]| {
            let args = RegressArgs::parse_from(argv.iter().copied());
            let Command::Run(run) = args.command else {
                panic!("expected run subcommand");
            };
            (run.compile_only, run.sim_only, run.verbose)
        };
        assert_eq!(parse(&["regress", "run"]), (false, false, false));
        assert_eq!(parse(&["regress", "run", "--co", "--so", "-v"]), (true, true, true));
        assert_eq!(parse(&["regress", "run", "--co", "1", "--so", "0", "--verbose", "1"]), (true, false, true));
        assert_eq!(parse(&["regress", "run", "--co", "--steps", "gen"]), (true, false, false));
        assert!(RegressArgs::try_parse_from(["regress", "run", "--co", "maybe"]).is_err());
    }

    #[test]
    fn test_bad_steps_is_config_error() {
        let args = RegressArgs::parse_from(["regress", "run", "--steps", "sim"]);
        let Command::Run(run) = args.command else {
            panic!("expected run subcommand");
        };
        assert!(run.plan(Path::new(".")).is_err());
    }

    #[test]
    fn test_csr_width_parser() {
        assert_eq!(parse_xlen("64"), Ok(Xlen::Rv64));
        assert!(parse_xlen("16").is_err());
        assert!(parse_xlen("wide").is_err());
    }
}
