//! Child process execution with lossy decoding and timeouts

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, ToolError};

/// How long readers may keep draining pipes after the child is killed.
/// A grandchild that left the process group can still hold the pipes open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Outcome of one process run. A non-zero exit code is data, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_seconds: f64,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn combined(&self) -> String {
        join_streams(&self.stdout, &self.stderr)
    }
}

/// stdout and stderr joined, skipping empty streams
pub fn join_streams(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}

type SharedBuf = Arc<Mutex<Vec<u8>>>;

/// Run `argv[0]` with `argv[1..]` in `cwd`, overlaying `env` on the
/// inherited environment.
///
/// When `timeout` elapses the child is killed and `ToolError::Timeout`
/// carries whatever output was captured up to that point.
pub async fn run(
    argv: &[String],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout: Option<Duration>,
) -> Result<CommandResult> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ToolError::validation("argv", "empty command"))?;

    debug!("Running: {} in {}", argv.join(" "), cwd.display());

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a timeout also reaches ninja, the compilers and
    // the monitor that idf.py spawns.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command
        .spawn()
        .map_err(|source| ToolError::Execution {
            program: program.clone(),
            source,
        })?;

    let start = Instant::now();
    let stdout_buf: SharedBuf = Arc::default();
    let stderr_buf: SharedBuf = Arc::default();
    let mut readers = Vec::new();
    if let Some(out) = child.stdout.take() {
        readers.push(spawn_reader(out, stdout_buf.clone()));
    }
    if let Some(err) = child.stderr.take() {
        readers.push(spawn_reader(err, stderr_buf.clone()));
    }

    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    match waited {
        Some(status) => {
            let status = status.map_err(|source| ToolError::Execution {
                program: program.clone(),
                source,
            })?;
            drain(readers).await;

            let result = CommandResult {
                exit_code: status.code().unwrap_or(-1),
                stdout: decode(&stdout_buf),
                stderr: decode(&stderr_buf),
                duration_seconds: start.elapsed().as_secs_f64(),
            };
            debug!("{} exited with {} after {:.2}s", program, result.exit_code, result.duration_seconds);
            Ok(result)
        }
        None => {
            let seconds = timeout.map(|t| t.as_secs()).unwrap_or_default();
            warn!("{} exceeded {}s, terminating", program, seconds);
            if let Some(pid) = child.id() {
                kill_group(pid);
            }
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", program, e);
            }
            drain(readers).await;

            Err(ToolError::Timeout {
                seconds,
                stdout: decode(&stdout_buf),
                stderr: decode(&stderr_buf),
            })
        }
    }
}

/// SIGKILL every process in the group led by `pid`
#[cfg(unix)]
fn kill_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this child.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

fn spawn_reader<R>(mut pipe: R, buf: SharedBuf) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => lock(&buf).extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!("Pipe read error: {}", e);
                    break;
                }
            }
        }
    })
}

/// Wait for readers to hit EOF, abandoning any still blocked after the grace period
async fn drain(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }
}

fn lock(buf: &SharedBuf) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Lossy UTF-8: undecodable bytes become U+FFFD, never an error
fn decode(buf: &SharedBuf) -> String {
    String::from_utf8_lossy(&lock(buf)).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_split_streams() {
        let result = run(&sh("echo out; echo err >&2"), Path::new("/"), &BTreeMap::new(), None)
            .await
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_data() {
        let result = run(&sh("echo failing; exit 3"), Path::new("/"), &BTreeMap::new(), None)
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert_eq!(result.stdout.trim(), "failing");
    }

    #[tokio::test]
    async fn test_env_overlay_and_cwd() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut env = BTreeMap::new();
        env.insert("IDF_PATH".to_string(), "/opt/esp-idf".to_string());
        let result = run(&sh("echo $IDF_PATH; pwd"), tmp.path(), &env, None).await.unwrap();
        let lines: Vec<&str> = result.stdout.lines().collect();
        assert_eq!(lines[0], "/opt/esp-idf");
        let cwd = std::path::PathBuf::from(lines[1]).canonicalize().unwrap();
        assert_eq!(cwd, tmp.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let result = run(&sh("printf 'ok\\377\\376done'"), Path::new("/"), &BTreeMap::new(), None)
            .await
            .unwrap();
        assert!(result.stdout.starts_with("ok"));
        assert!(result.stdout.ends_with("done"));
        assert!(result.stdout.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_output() {
        let started = Instant::now();
        let err = run(
            &sh("echo started; sleep 30"),
            Path::new("/"),
            &BTreeMap::new(),
            Some(Duration::from_millis(500)),
        )
        .await
        .unwrap_err();

        match err {
            ToolError::Timeout { stdout, .. } => assert_eq!(stdout.trim(), "started"),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = run(
            &sh("sh -c 'echo $$ > grandchild.pid; exec sleep 30' & wait"),
            tmp.path(),
            &BTreeMap::new(),
            Some(Duration::from_millis(500)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));

        let pid = std::fs::read_to_string(tmp.path().join("grandchild.pid")).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());
        // Dead means gone, or a zombie nobody has reaped yet.
        let mut alive = true;
        for _ in 0..50 {
            alive = match std::fs::read_to_string(&stat) {
                Ok(s) => !s.rsplit(')').next().unwrap_or("").trim_start().starts_with('Z'),
                Err(_) => false,
            };
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!alive, "grandchild {} survived the timeout", pid.trim());
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_error() {
        let err = run(
            &["definitely-not-a-real-binary-xyz".to_string()],
            Path::new("/"),
            &BTreeMap::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_empty_argv_rejected() {
        let err = run(&[], Path::new("/"), &BTreeMap::new(), None).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[test]
    fn test_combined_skips_empty_streams() {
        let r = CommandResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: "only err".to_string(),
            duration_seconds: 0.0,
        };
        assert_eq!(r.combined(), "only err");
    }
}
