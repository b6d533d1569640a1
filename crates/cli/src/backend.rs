//! Content backend that delegates to an external command.
//!
//! The command runs under `sh -c`, receives the prompt on stdin and the word budget in
//! `ITEMDEF_WORD_BUDGET`, and answers on stdout. Any model client that can be driven from a
//! shell can serve as the generation backend this way.

use itemdef_core::{BackendError, BackendResult, ContentBackend};
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Environment variable carrying the word budget to the command.
pub const WORD_BUDGET_ENV: &str = "ITEMDEF_WORD_BUDGET";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Runs a shell command per section under a wall-clock limit.
///
/// The limit covers the whole exchange: writing the prompt, the command itself and draining
/// its output. On Unix the command gets its own process group, and the group is killed when
/// the limit is hit, so background jobs started by the command cannot hold the pipes open.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    command: String,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn spawn(&self, word_budget: u32) -> BackendResult<Child> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .env(WORD_BUDGET_ENV, word_budget.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map_err(|e| {
            BackendError::Unavailable(format!("failed to start '{}': {e}", self.command))
        })
    }

    fn exchange(
        &self,
        child: &mut Child,
        prompt: &str,
        deadline: Instant,
    ) -> BackendResult<String> {
        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(BackendError::Unavailable(
                "backend command pipes unavailable".into(),
            ));
        };

        // Pipes are serviced on their own threads so a large prompt or answer cannot
        // deadlock against the child.
        let prompt = prompt.to_string();
        let writer = run_detached(move || match stdin.write_all(prompt.as_bytes()) {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
            _ => Ok(()),
        });
        let out_reader = run_detached(move || {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).map(|_| buf)
        });
        let err_reader = run_detached(move || {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).map(|_| buf)
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => return Err(self.timed_out()),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(BackendError::Failed(e.to_string())),
            }
        };

        // The shell may have exited while a job it started still holds the pipes.
        let output = self
            .receive(&out_reader, deadline, "stdout reader")?
            .map_err(|e| BackendError::Failed(format!("failed to read output: {e}")))?;
        let diagnostics = self
            .receive(&err_reader, deadline, "stderr reader")?
            .unwrap_or_default();
        self.receive(&writer, deadline, "stdin writer")?
            .map_err(|e| BackendError::Failed(format!("failed to write prompt: {e}")))?;

        if !status.success() {
            return Err(BackendError::Failed(format!(
                "command exited with {status}: {}",
                diagnostics.trim()
            )));
        }

        Ok(output)
    }

    fn receive<T>(&self, rx: &Receiver<T>, deadline: Instant, name: &str) -> BackendResult<T> {
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BackendError::Failed(format!("{name} thread panicked")))
            }
        }
    }

    fn timed_out(&self) -> BackendError {
        tracing::warn!(
            command = %self.command,
            timeout = ?self.timeout,
            "backend command timed out"
        );
        BackendError::Timeout(self.timeout)
    }
}

impl ContentBackend for CommandBackend {
    fn generate(&self, prompt: &str, word_budget: u32) -> BackendResult<String> {
        let deadline = Instant::now() + self.timeout;
        let mut child = self.spawn(word_budget)?;

        let result = self.exchange(&mut child, prompt, deadline);
        if result.is_err() {
            terminate(&mut child);
        }
        result
    }
}

/// Run `f` on its own thread and hand its result back through a channel.
fn run_detached<T, F>(f: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx
}

/// Kill the command and everything it started, then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn backend(command: &str) -> CommandBackend {
        CommandBackend::new(command, Duration::from_secs(10))
    }

    #[test]
    fn prompt_is_passed_on_stdin() {
        let out = backend("cat").generate("Describe the item.", 100).unwrap();
        assert_eq!(out, "Describe the item.");
    }

    #[test]
    fn word_budget_is_exported() {
        let out = backend("printf '%s' \"$ITEMDEF_WORD_BUDGET\"")
            .generate("ignored", 275)
            .unwrap();
        assert_eq!(out, "275");
    }

    #[test]
    fn commands_ignoring_stdin_still_succeed() {
        let out = backend("echo generated").generate("prompt", 100).unwrap();
        assert_eq!(out.trim(), "generated");
    }

    #[test]
    fn non_zero_exit_is_a_failure_with_stderr() {
        let err = backend("echo quota exceeded >&2; exit 3")
            .generate("prompt", 100)
            .unwrap_err();
        match err {
            BackendError::Failed(msg) => assert!(msg.contains("quota exceeded"), "{msg}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn background_jobs_holding_stdout_cannot_outlive_the_timeout() {
        let started = Instant::now();
        let err = CommandBackend::new("echo hi; sleep 4 &", Duration::from_millis(300))
            .generate("prompt", 100)
            .unwrap_err();
        assert_eq!(err, BackendError::Timeout(Duration::from_millis(300)));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn background_jobs_with_closed_pipes_do_not_delay_the_answer() {
        let out = backend("echo hi; sleep 4 >/dev/null 2>&1 </dev/null &")
            .generate("prompt", 100)
            .unwrap();
        assert_eq!(out.trim(), "hi");
    }

    #[test]
    fn slow_commands_time_out() {
        let started = Instant::now();
        let err = CommandBackend::new("sleep 5", Duration::from_millis(200))
            .generate("prompt", 100)
            .unwrap_err();
        assert_eq!(err, BackendError::Timeout(Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
