//! Subprocess execution under a deadline.
//!
//! Every child is started in its own process group so that a timeout can
//! take down whatever it forked. The group is killed and the child reaped on
//! every path out of [`run_command`]. Output is drained by reader threads;
//! if those do not finish before the hard deadline (a descendant kept a pipe
//! open) the run is reported as timed out and the readers are abandoned.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Deadlines and retry policy for one subprocess.
#[derive(Debug, Clone, Copy)]
pub struct ExecLimits {
    /// Nominal wall-clock budget, measured from a successful spawn.
    pub timeout: Duration,
    /// Last-resort budget, measured from the first spawn attempt. Bounds both
    /// spawn retries and output draining.
    pub hard_timeout: Duration,
    /// Maximum retries after transient spawn failures.
    pub spawn_retries: u32,
}

/// Captured result of a finished (or killed) subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run `argv` in `cwd` (or the current directory), feeding `input` on
/// stdin, and wait for it within `limits`.
///
/// Returns `Err` only when the process cannot be started at all.
pub fn run_command(
    argv: &[String],
    input: Option<&[u8]>,
    cwd: Option<&Path>,
    limits: &ExecLimits,
) -> std::io::Result<ProcessOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
    })?;

    let started = Instant::now();
    let hard_deadline = started.checked_add(limits.hard_timeout).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "hard timeout out of range")
    })?;
    let mut child = retry_transient(
        program,
        || spawn(program, args, input.is_some(), cwd),
        limits,
        hard_deadline,
    )?;
    tracing::debug!(pid = child.id(), command = ?argv, "spawned");

    if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
        let data = data.to_vec();
        std::thread::spawn(move || {
            // The child may exit without reading; a broken pipe is expected.
            let _ = stdin.write_all(&data);
        });
    }

    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Stream::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Stream::Stderr, tx.clone());
    }
    drop(tx);

    let waited = child.wait_timeout(limits.timeout);
    let (status, mut timed_out) = match waited {
        Ok(Some(status)) => {
            kill_group(&child);
            (Some(status), false)
        }
        Ok(None) => {
            tracing::debug!(pid = child.id(), "timeout expired, killing");
            (terminate(&mut child), true)
        }
        Err(e) => {
            terminate(&mut child);
            return Err(e);
        }
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for _ in 0..2 {
        let remaining = hard_deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, data)) => stdout = data,
            Ok((Stream::Stderr, data)) => stderr = data,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("output pipes still open at hard deadline, abandoning readers");
                timed_out = true;
                break;
            }
        }
    }

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code: status.and_then(|s| s.code()),
        timed_out,
        elapsed: started.elapsed(),
    })
}

fn spawn(
    program: &str,
    args: &[String],
    piped_stdin: bool,
    cwd: Option<&Path>,
) -> std::io::Result<Child> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if piped_stdin { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn()
}

/// Call `attempt` until it succeeds, retrying transient failures at most
/// `limits.spawn_retries` times and never past `hard_deadline`.
fn retry_transient<T>(
    program: &str,
    mut attempt: impl FnMut() -> std::io::Result<T>,
    limits: &ExecLimits,
    hard_deadline: Instant,
) -> std::io::Result<T> {
    let mut retries = 0u32;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e)
                if is_transient(&e)
                    && retries < limits.spawn_retries
                    && Instant::now() < hard_deadline =>
            {
                retries += 1;
                tracing::debug!(program, retries, error = %e, "transient spawn failure, retrying");
                let backoff = Duration::from_millis(10 * u64::from(retries.min(10)));
                std::thread::sleep(backoff.min(hard_deadline.saturating_duration_since(Instant::now())));
            }
            Err(e) => return Err(e),
        }
    }
}

/// OS-level errors that tend to clear up on their own under heavy load.
fn is_transient(e: &std::io::Error) -> bool {
    if matches!(
        e.kind(),
        std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
    ) {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(
            e.raw_os_error(),
            Some(libc::ETXTBSY | libc::EAGAIN | libc::EMFILE | libc::ENFILE | libc::ENOMEM)
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: mpsc::Sender<(Stream, Vec<u8>)>) {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, buf));
    });
}

/// Kill everything left in the child's process group.
fn kill_group(child: &Child) {
    #[cfg(unix)]
    {
        // SAFETY: kill(2) has no memory-safety preconditions; the negative pid
        // addresses the process group created for this child.
        unsafe {
            libc::kill(-(child.id() as i32), libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Kill the child and its group, then reap it.
fn terminate(child: &mut Child) -> Option<ExitStatus> {
    kill_group(child);
    let _ = child.kill();
    child.wait().ok()
}
