//! External process invocation.
//!
//! Stages never build shell strings. They describe each call as an
//! [`Invocation`] and hand it to a [`Runner`], which is the only place that
//! touches `std::process`.

use std::{
    fmt,
    fs::{File, OpenOptions},
    io::Read,
    path::{Path, PathBuf},
    process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use crate::errors::{RegressError, Result};

/// Where the combined stdout/stderr of an invocation goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Collected and returned in [`Completion::output`].
    Capture,
    /// Written to the file, replacing previous content.
    Truncate(PathBuf),
    /// Appended to the file.
    Append(PathBuf),
}

/// One concrete external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputTarget,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            output: OutputTarget::Capture,
            timeout: None,
        }
    }

    /// Builds an invocation from already resolved words; the first word is
    /// the program.
    pub fn from_words(words: Vec<String>) -> Option<Self> {
        let mut words = words.into_iter();
        let program = words.next()?;
        Some(Self::new(program).args(words))
    }

    /// Runs this invocation through `prefix`, e.g. a job-submission
    /// command. The prefix's first word becomes the program.
    pub fn prefixed(self, prefix: &[String]) -> Self {
        let Some((program, rest)) = prefix.split_first() else {
            return self;
        };
        let Self {
            program: inner,
            args,
            cwd,
            output,
            timeout,
        } = self;
        Self {
            program: program.clone(),
            args: rest
                .iter()
                .cloned()
                .chain(std::iter::once(inner))
                .chain(args)
                .collect(),
            cwd,
            output,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        match &self.output {
            OutputTarget::Capture => Ok(()),
            OutputTarget::Truncate(path) => write!(f, " &> {}", path.display()),
            OutputTarget::Append(path) => write!(f, " &>> {}", path.display()),
        }
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Exit code; `None` when the process was ended by a signal.
    pub code: Option<i32>,
    pub timed_out: bool,
    /// Combined output when the target was [`OutputTarget::Capture`].
    pub output: String,
}

impl Completion {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }
}

/// Executes invocations. Blocking and one at a time.
pub trait Runner {
    /// Runs `invocation` to completion. An `Err` means the process could
    /// not be started at all; a started process that fails is reported
    /// through the returned [`Completion`].
    fn run(&mut self, invocation: &Invocation) -> Result<Completion>;
}

impl<R: Runner + ?Sized> Runner for &mut R {
    fn run(&mut self, invocation: &Invocation) -> Result<Completion> {
        (**self).run(invocation)
    }
}

// ============================================================================
// SYSTEM RUNNER
// ============================================================================

/// Runs invocations as real child processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long output readers may keep draining after a timed-out process
/// group was killed.
const READER_GRACE: Duration = Duration::from_millis(500);

impl Runner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<Completion> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        match &invocation.output {
            OutputTarget::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputTarget::Truncate(path) => {
                let file = File::create(path).map_err(|e| {
                    RegressError::io(format!("failed to create {}", path.display()), e)
                })?;
                redirect(&mut cmd, file, path)?;
            }
            OutputTarget::Append(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        RegressError::io(format!("failed to open {}", path.display()), e)
                    })?;
                redirect(&mut cmd, file, path)?;
            }
        }

        // A bounded invocation leads its own process group, so the timeout
        // reaches everything it started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            if invocation.timeout.is_some() {
                cmd.process_group(0);
            }
        }

        let mut child = cmd.spawn().map_err(|source| RegressError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let readers = OutputReaders::start(child.stdout.take(), child.stderr.take());

        let (status, timed_out) = wait_with_timeout(&mut child, invocation.timeout)
            .map_err(|e| RegressError::io(format!("failed to wait for `{}`", invocation.program), e))?;

        let deadline = timed_out.then(|| Instant::now() + READER_GRACE);
        let output = readers.collect(deadline);

        Ok(Completion {
            code: status.code(),
            timed_out,
            output: String::from_utf8_lossy(&output).into_owned(),
        })
    }
}

/// Drains a child's pipes on background threads.
struct OutputReaders {
    rx: mpsc::Receiver<(usize, Vec<u8>)>,
    pending: usize,
}

impl OutputReaders {
    fn start(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = stdout {
            spawn_reader(0, pipe, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = stderr {
            spawn_reader(1, pipe, tx);
            pending += 1;
        }
        Self { rx, pending }
    }

    /// Returns stdout followed by stderr. With a deadline, pipes still held
    /// open by an escaped descendant are abandoned once it passes.
    fn collect(self, deadline: Option<Instant>) -> Vec<u8> {
        let mut chunks = Vec::with_capacity(self.pending);
        for _ in 0..self.pending {
            let chunk = match deadline {
                None => self.rx.recv().ok(),
                Some(d) => self
                    .rx
                    .recv_timeout(d.saturating_duration_since(Instant::now()))
                    .ok(),
            };
            match chunk {
                Some(chunk) => chunks.push(chunk),
                None => break,
            }
        }
        chunks.sort_by_key(|(stream, _)| *stream);
        chunks.into_iter().flat_map(|(_, bytes)| bytes).collect()
    }
}

fn spawn_reader(stream: usize, mut pipe: impl Read + Send + 'static, tx: mpsc::Sender<(usize, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, buf));
    });
}

fn redirect(cmd: &mut Command, file: File, path: &Path) -> Result<()> {
    let err_file = file
        .try_clone()
        .map_err(|e| RegressError::io(format!("failed to duplicate {}", path.display()), e))?;
    cmd.stdout(Stdio::from(file)).stderr(Stdio::from(err_file));
    Ok(())
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<(ExitStatus, bool)> {
    let Some(limit) = timeout else {
        return Ok((child.wait()?, false));
    };
    let deadline = Instant::now().checked_add(limit);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            kill_group(child);
            let status = child.wait()?;
            return Ok((status, true));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills the child and, on unix, the process group it leads.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) takes no pointers; a negative pid addresses
            // the group created for this child at spawn.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}
