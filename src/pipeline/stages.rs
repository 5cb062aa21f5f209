use std::{fs, path::Path, time::Duration};

use tracing::{debug, info, warn};

use super::{GeneratorOptions, Pipeline};
use crate::{
    config::{RISCV_GCC, RISCV_OBJCOPY},
    errors::{captured_output, RegressError, Result, ToolKind},
    process::{Completion, Invocation, OutputTarget, Runner},
    profile::{self, IssProfile, ToolProfile},
    report::{ComparisonReport, Summary},
    selector::TestCase,
    template::{isa_variant, unresolved, Bindings, Placeholder},
};

/// Wall-clock limit for one instruction generator run.
pub const GENERATOR_TIMEOUT: Duration = Duration::from_secs(300);

/// The ISS always placed first in a comparison.
pub const REFERENCE_ISS: &str = "spike";

const LINKER_SCRIPT: &str = "scripts/link.ld";
const COMPARE_TOOL: &str = "iss_cmp";

/// Orders a two-ISS list for comparison, moving the reference ISS first.
/// Any other number of names means there is nothing to compare.
pub fn comparison_pair(iss_list: &str) -> Result<Option<(String, String)>> {
    let names = split_list(iss_list)?;
    let [first, second] = names.as_slice() else {
        return Ok(None);
    };
    if *second == REFERENCE_ISS {
        Ok(Some((second.to_string(), first.to_string())))
    } else {
        Ok(Some((first.to_string(), second.to_string())))
    }
}

/// Splits a comma-separated ISS list. An empty name is an unknown ISS.
fn split_list(list: &str) -> Result<Vec<&str>> {
    list.split(',')
        .map(str::trim)
        .map(|name| {
            if name.is_empty() {
                Err(RegressError::UnknownTool {
                    kind: ToolKind::Iss,
                    name: list.to_string(),
                    help: Some("name ISSs as a comma-separated list, e.g. spike,ovpsim".to_string()),
                })
            } else {
                Ok(name)
            }
        })
        .collect()
}

/// Every (test, iteration) pair, in test-list order.
fn iterations(tests: &[TestCase]) -> impl Iterator<Item = (&TestCase, u32)> {
    tests
        .iter()
        .flat_map(|test| (0..test.iterations).map(move |i| (test, i)))
}

fn command(bindings: &Bindings, template: &str) -> Result<Invocation> {
    let words = bindings.resolve_words(template)?;
    for word in &words {
        for name in unresolved(word) {
            warn!(placeholder = %name, template, "unbound placeholder left in command");
        }
    }
    Invocation::from_words(words).ok_or_else(|| {
        RegressError::EmptyCommand {
            template: template.to_string(),
        }
    })
}

impl<R: Runner> Pipeline<'_, R> {
    // ========================================================================
    // GEN
    // ========================================================================

    /// Builds the instruction generator and runs it once per test case.
    pub fn generate(
        &mut self,
        tests: &[TestCase],
        profiles: &[ToolProfile],
        options: &GeneratorOptions,
    ) -> Result<()> {
        let profile = profile::lookup(profiles, &options.simulator)?;
        info!(tool = %profile.tool_name, "found matching simulator");
        let bindings = self.directory_bindings();

        if !options.sim_only {
            info!("building RISC-V instruction generator");
            for template in &profile.compile_commands {
                let inv = command(&bindings, template)?;
                self.echo_command(&inv);
                let done = self.runner.run(&inv)?;
                self.echo_output(&done);
                if !done.success() {
                    return Err(RegressError::GeneratorBuild {
                        command: inv.to_string(),
                        code: done.code,
                        output: captured_output(&done.output),
                    });
                }
            }
        }

        if options.compile_only {
            return Ok(());
        }

        info!("running RISC-V instruction generator");
        let run = command(&bindings, &profile.run_command)?.prefixed(&options.job_prefix);
        for test in tests.iter().filter(|t| t.iterations > 0) {
            let seed = self.next_seed(options.seed);
            let inv = run
                .clone()
                .arg(format!("+UVM_TESTNAME={}", test.target))
                .arg(format!("+num_of_tests={}", test.iterations))
                .arg(format!(
                    "+asm_file_name={}",
                    self.layout.asm_base(&test.name).display()
                ))
                .arg(format!("+ntb_random_seed={seed}"))
                .arg("-l")
                .path_arg(&self.layout.generator_log(&test.name))
                .timeout(GENERATOR_TIMEOUT);

            info!(
                target_test = %test.target,
                iterations = test.iterations,
                seed,
                "run {} to generate {} assembly tests",
                test.target,
                test.iterations
            );
            self.echo_command(&inv);
            let done = self.runner.run(&inv)?;
            if done.timed_out {
                return Err(RegressError::GeneratorTimeout {
                    test: test.name.clone(),
                    seconds: GENERATOR_TIMEOUT.as_secs(),
                    output: captured_output(&done.output),
                });
            }
            if !done.success() {
                return Err(RegressError::GeneratorRun {
                    test: test.name.clone(),
                    code: done.code,
                    output: captured_output(&done.output),
                });
            }
            self.echo_output(&done);
        }
        Ok(())
    }

    // ========================================================================
    // GCC COMPILE
    // ========================================================================

    /// Compiles every generated program to an object file and a raw binary.
    pub fn compile(&mut self, tests: &[TestCase]) -> Result<()> {
        let gcc = self.env.require(RISCV_GCC)?.to_string();
        let objcopy = self.env.require(RISCV_OBJCOPY)?.to_string();
        let linker_script = self.ctx.working_dir.join(LINKER_SCRIPT);

        for (test, i) in iterations(tests) {
            let asm = self.layout.source(&test.name, i);
            let elf = self.layout.object(&test.name, i);
            let binary = self.layout.binary(&test.name, i);

            info!(asm = %asm.display(), "compiling");
            let inv = Invocation::new(&gcc)
                .arg(format!("-march={}", self.ctx.isa))
                .arg(format!("-mabi={}", self.ctx.abi))
                .args([
                    "-static",
                    "-mcmodel=medany",
                    "-fvisibility=hidden",
                    "-nostdlib",
                    "-nostartfiles",
                ])
                .arg(format!("-T{}", linker_script.display()))
                .path_arg(&asm)
                .arg("-o")
                .path_arg(&elf);
            self.run_toolchain(&inv, "compile", &asm)?;

            info!(binary = %binary.display(), "converting to plain binary");
            let inv = Invocation::new(&objcopy)
                .args(["-O", "binary"])
                .path_arg(&elf)
                .path_arg(&binary);
            self.run_toolchain(&inv, "objcopy", &elf)?;
        }
        Ok(())
    }

    fn run_toolchain(&mut self, inv: &Invocation, step: &'static str, input: &Path) -> Result<()> {
        self.echo_command(inv);
        let done = self.runner.run(inv)?;
        self.echo_output(&done);
        if done.success() {
            return Ok(());
        }
        Err(RegressError::Toolchain {
            step,
            input: input.to_path_buf(),
            code: done.code,
            output: captured_output(&done.output),
        })
    }

    // ========================================================================
    // ISS SIM
    // ========================================================================

    /// Runs every object file on each ISS in the comma-separated `iss_list`.
    ///
    /// Configuration problems abort; a failing simulation only logs a
    /// warning, and shows up later as a failed comparison.
    pub fn simulate(
        &mut self,
        tests: &[TestCase],
        iss_list: &str,
        profiles: &[IssProfile],
    ) -> Result<()> {
        for iss in split_list(iss_list)? {
            let profile = profile::lookup(profiles, iss)?;
            info!(iss, "found matching ISS");
            let path_value = self.env.require(&profile.path_var)?;
            let bindings = self
                .directory_bindings()
                .bind(Placeholder::PathVar, path_value)
                .bind(Placeholder::Variant, isa_variant(iss, &self.ctx.isa));

            let log_dir = self.layout.iss_log_dir(iss);
            info!(iss, log_dir = %log_dir.display(), "ISS sim log dir");
            fs::create_dir_all(&log_dir).map_err(|e| {
                RegressError::io(format!("failed to create {}", log_dir.display()), e)
            })?;

            for (test, i) in iterations(tests) {
                let elf = self.layout.object(&test.name, i);
                let log = self.layout.iss_log(iss, &test.name, i);
                let inv = command(
                    &bindings
                        .clone()
                        .bind(Placeholder::Elf, elf.display().to_string())
                        .bind(Placeholder::Log, log.display().to_string()),
                    &profile.run_command,
                )?
                .output(OutputTarget::Truncate(log));

                info!(iss, elf = %elf.display(), "running ISS simulation");
                self.echo_command(&inv);
                match self.runner.run(&inv) {
                    Ok(done) if done.success() => {}
                    Ok(done) => warn!(iss, elf = %elf.display(), code = ?done.code, "ISS simulation failed"),
                    Err(e) => warn!(iss, elf = %elf.display(), error = %e, "ISS simulation did not start"),
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // ISS CMP
    // ========================================================================

    /// Compares the logs of exactly two ISSs for every iteration and
    /// summarizes the results into `<out>/iss_regr.log`.
    ///
    /// Returns `None` when `iss_list` does not name exactly two simulators.
    pub fn compare(&mut self, tests: &[TestCase], iss_list: &str) -> Result<Option<Summary>> {
        let Some((first, second)) = comparison_pair(iss_list)? else {
            info!(iss = iss_list, "comparison needs exactly two ISSs, skipping");
            return Ok(None);
        };

        let report = ComparisonReport::create(self.layout.report())?;
        let tool = self.ctx.working_dir.join(COMPARE_TOOL);

        for (test, i) in iterations(tests) {
            let elf = self.layout.object(&test.name, i);
            info!(elf = %elf.display(), "comparing ISS sim result {first}/{second}");
            report.record_binary(&elf)?;

            let inv = Invocation::new(tool.display().to_string())
                .path_arg(&self.layout.iss_log(&first, &test.name, i))
                .path_arg(&self.layout.iss_log(&second, &test.name, i))
                .path_arg(report.path())
                .output(OutputTarget::Append(report.path().to_path_buf()));
            self.echo_command(&inv);
            match self.runner.run(&inv) {
                Ok(done) if done.success() => {}
                Ok(done) => {
                    warn!(elf = %elf.display(), code = ?done.code, "ISS comparison failed");
                    let status = done.code.map_or("a signal".to_string(), |c| format!("status {c}"));
                    report.append_line(&format!("Comparison error: {COMPARE_TOOL} exited with {status}"))?;
                }
                Err(e) => {
                    warn!(elf = %elf.display(), error = %e, "ISS comparison did not start");
                    report.append_line(&format!("Comparison error: {e}"))?;
                }
            }
        }

        let report_path = report.path().to_path_buf();
        let summary = report.finish()?;
        info!(passed = summary.passed, failed = summary.failed, "{summary}");
        info!(report = %report_path.display(), "ISS regression report saved");
        Ok(Some(summary))
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn directory_bindings(&self) -> Bindings {
        Bindings::new()
            .bind(Placeholder::Out, self.ctx.output_dir.display().to_string())
            .bind(Placeholder::Cwd, self.ctx.working_dir.display().to_string())
    }

    fn echo_command(&self, inv: &Invocation) {
        if self.ctx.verbose {
            info!(command = %inv, "executing");
        } else {
            debug!(command = %inv, "executing");
        }
    }

    fn echo_output(&self, done: &Completion) {
        let output = done.output.trim_end();
        if output.is_empty() {
            return;
        }
        if self.ctx.verbose {
            info!("{output}");
        } else {
            debug!("{output}");
        }
    }
}
