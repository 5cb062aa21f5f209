//! The regression pipeline.
//!
//! A run resolves its working set of tests once, then executes the
//! requested stages in the fixed order gen → gcc_compile → iss_sim →
//! iss_cmp. Stages communicate only through files named by
//! [`OutputLayout`], so any subset can be rerun on top of an earlier run's
//! output directory.

use std::{fs, path::PathBuf};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::{
    config::{Environment, PipelineContext, Seed},
    errors::{RegressError, Result},
    layout::OutputLayout,
    process::Runner,
    profile::{load_iss_profiles, load_tool_profiles},
    report::Summary,
    selector::{self, TestCase},
};

mod stages;
mod steps;

pub use stages::{comparison_pair, GENERATOR_TIMEOUT, REFERENCE_ISS};
pub use steps::{Stage, StageSet};

/// Settings of the generator stage.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// RTL simulator profile used to build and run the generator.
    pub simulator: String,
    /// Build the generator but do not run it.
    pub compile_only: bool,
    /// Run the generator without rebuilding it.
    pub sim_only: bool,
    pub seed: Seed,
    /// Job-submission words placed in front of every generator run.
    pub job_prefix: Vec<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            simulator: "vcs".to_string(),
            compile_only: false,
            sim_only: false,
            seed: Seed::Random,
            job_prefix: Vec::new(),
        }
    }
}

/// Everything a full run needs beyond the shared context.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub steps: StageSet,
    pub testlist: PathBuf,
    /// Test name, or `all`.
    pub test: String,
    /// Iteration override; 0 keeps the test list's counts.
    pub iterations: u32,
    pub generator: GeneratorOptions,
    pub simulator_yaml: PathBuf,
    /// Comma-separated ISS names.
    pub iss: String,
    pub iss_yaml: PathBuf,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub tests: Vec<TestCase>,
    pub stages: Vec<Stage>,
    /// Present when the compare stage ran with a pair of ISSs.
    pub summary: Option<Summary>,
}

/// Drives the stages against one output directory.
pub struct Pipeline<'a, R> {
    ctx: &'a PipelineContext,
    env: &'a Environment,
    layout: OutputLayout,
    runner: R,
    rng: Xoshiro256StarStar,
}

impl<'a, R: Runner> Pipeline<'a, R> {
    pub fn new(ctx: &'a PipelineContext, env: &'a Environment, runner: R) -> Self {
        Self {
            ctx,
            env,
            layout: OutputLayout::new(&ctx.output_dir),
            runner,
            rng: Xoshiro256StarStar::from_entropy(),
        }
    }

    /// Makes random generator seeds reproducible.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256StarStar::seed_from_u64(seed);
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Creates the output directory and its `asm_tests` subdirectory.
    pub fn prepare(&self) -> Result<()> {
        let dir = self.layout.asm_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| RegressError::io(format!("failed to create {}", dir.display()), e))
    }

    /// Runs the stages requested by `plan`.
    pub fn execute(&mut self, plan: &RunPlan) -> Result<RunOutcome> {
        self.prepare()?;

        tracing::info!(
            testlist = %plan.testlist.display(),
            test = %plan.test,
            "processing regression test list"
        );
        let catalog = selector::load_test_list(&plan.testlist)?;
        let tests = selector::select(&catalog, &plan.test, plan.iterations);
        if tests.is_empty() {
            return Err(RegressError::NoMatchingTests {
                test: plan.test.clone(),
                testlist: plan.testlist.clone(),
            });
        }

        let mut outcome = RunOutcome {
            tests,
            stages: Vec::new(),
            summary: None,
        };
        for stage in plan.steps.iter() {
            match stage {
                Stage::Gen => {
                    let profiles = load_tool_profiles(&plan.simulator_yaml)?;
                    self.generate(&outcome.tests, &profiles, &plan.generator)?;
                }
                Stage::GccCompile => self.compile(&outcome.tests)?,
                Stage::IssSim => {
                    let profiles = load_iss_profiles(&plan.iss_yaml)?;
                    self.simulate(&outcome.tests, &plan.iss, &profiles)?;
                }
                Stage::IssCmp => outcome.summary = self.compare(&outcome.tests, &plan.iss)?,
            }
            outcome.stages.push(stage);
        }
        Ok(outcome)
    }

    fn next_seed(&mut self, seed: Seed) -> u64 {
        use rand::RngCore;

        match seed {
            Seed::Fixed(value) => value,
            Seed::Random => u64::from(self.rng.next_u32()),
        }
    }
}
