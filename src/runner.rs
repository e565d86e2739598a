use std::future::{self, Future};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::watch;

use crate::error::{Error, Result};

/// One external program call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    /// gpg operation name carried into errors, e.g. `"decrypt"`.
    pub operation: &'static str,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Bytes written to the program's stdin; stdin is closed when `None`.
    pub stdin: Option<Vec<u8>>,
    pub timeout_secs: Option<u64>,
}

/// Captured result of a finished program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes external programs for [`Gpg`](crate::Gpg).
///
/// Implementations only report spawn and I/O failures as errors; a
/// nonzero exit is returned as a [`RunOutput`] for the caller to judge.
pub trait Runner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<RunOutput>> + Send;
}

/// [`Runner`] backed by `tokio::process`.
///
/// The child is killed when the call times out, when the cancellation
/// signal fires, or when the returned future is dropped.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    cancel: Option<watch::Receiver<bool>>,
}

impl ProcessRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts in-flight calls with [`Error::Cancelled`] once `true` is sent
    /// on the channel.
    #[must_use]
    pub fn with_cancel(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }
}

impl Runner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<RunOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.env("LC_ALL", "C")
            .env("LANGUAGE", "C")
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let operation = invocation.operation;
        let spawn_error = move |source: io::Error| Error::Spawn { operation, source };

        let mut child = cmd.spawn().map_err(spawn_error)?;
        let pipe = child.stdin.take();
        let input = invocation.stdin.clone();

        let feed = async move {
            if let (Some(mut pipe), Some(data)) = (pipe, input) {
                pipe.write_all(&data).await?;
                pipe.shutdown().await?;
            }
            Ok::<_, io::Error>(())
        };

        let finished = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output.map_err(spawn_error)?;
            // gpg may exit before reading all of stdin; its status says more
            if let Err(e) = fed
                && e.kind() != io::ErrorKind::BrokenPipe
            {
                return Err(spawn_error(e));
            }
            Ok::<_, Error>(RunOutput {
                code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        };

        let deadline = async {
            match invocation.timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => future::pending().await,
            }
        };

        let mut cancel = self.cancel.clone();
        let cancelled = async {
            match cancel.as_mut() {
                Some(rx) => {
                    // a dropped sender can never cancel
                    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                    if closed {
                        future::pending::<()>().await;
                    }
                }
                None => future::pending().await,
            }
        };

        tokio::select! {
            result = finished => result,
            () = deadline => Err(Error::Timeout {
                operation,
                secs: invocation.timeout_secs.unwrap_or_default(),
            }),
            () = cancelled => Err(Error::Cancelled { operation }),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> Invocation {
        Invocation {
            operation: "test",
            program: PathBuf::from(program),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Invocation::default()
        }
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let output = ProcessRunner::new()
            .run(&invocation("echo", &["hello"]))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, b"hello\n");
    }

    #[tokio::test]
    async fn test_run_feeds_stdin() {
        let mut inv = invocation("cat", &[]);
        inv.stdin = Some(b"payload".to_vec());
        let output = ProcessRunner::new().run(&inv).await.unwrap();
        assert_eq!(output.stdout, b"payload");
    }

    #[tokio::test]
    async fn test_run_reports_nonzero_exit() {
        let output = ProcessRunner::new()
            .run(&invocation("false", &[]))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.code, Some(1));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let result = ProcessRunner::new()
            .run(&invocation("/nonexistent/gpg-binary", &[]))
            .await;
        match result {
            Err(Error::Spawn { operation, source }) => {
                assert_eq!(operation, "test");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let mut inv = invocation("sleep", &["5"]);
        inv.timeout_secs = Some(1);
        let result = ProcessRunner::new().run(&inv).await;
        assert!(matches!(
            result,
            Err(Error::Timeout {
                operation: "test",
                secs: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let (tx, rx) = watch::channel(false);
        let runner = ProcessRunner::with_cancel(rx);
        let inv = invocation("sleep", &["5"]);

        let handle = tokio::spawn(async move { runner.run(&inv).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled { operation: "test" })));
    }
}
