// src/process.rs

//! Bounded child process execution
//!
//! Output pipes are drained on reader threads while the parent waits, so a
//! child that writes more than a pipe buffer still runs to completion
//! instead of blocking until the timeout.

use std::io::{self, Read};
use std::process::{Child, ExitStatus};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Result of a child that exited within its timeout
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

/// Wait up to `timeout` for `child`, collecting whatever it writes
///
/// Returns `Ok(None)` after killing a child that outlived the timeout.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<CapturedOutput>> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            // Grandchildren may still hold the pipes; do not block on them
            return Ok(None);
        }
    };

    Ok(Some(CapturedOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    }))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn spawn(script: &str) -> Child {
        Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_large_output_does_not_block() {
        // Well past a 64 KiB pipe buffer on both streams
        let mut child = spawn(
            "i=0; while [ $i -lt 4000 ]; do \
             echo \"line $i padding padding padding padding\"; \
             echo \"err $i padding padding padding padding\" >&2; \
             i=$((i+1)); done",
        );
        let output = wait_with_timeout(&mut child, Duration::from_secs(20))
            .unwrap()
            .expect("child should exit on its own");

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 4000);
        assert_eq!(String::from_utf8_lossy(&output.stderr).lines().count(), 4000);
    }

    #[test]
    fn test_timeout_returns_none() {
        let mut child = spawn("sleep 5");
        let start = std::time::Instant::now();
        assert!(wait_with_timeout(&mut child, Duration::from_millis(200)).unwrap().is_none());
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
