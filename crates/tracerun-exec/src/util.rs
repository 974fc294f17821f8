use std::{process::ExitStatus, time::Duration};

use tokio::process::{Child, Command};

/// `program <global args...> <args...>` with no stdin.
pub fn cmd_program(program: &str, global_args: &[String], args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(global_args.iter().map(|s| s.as_str()));
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd.stdin(std::process::Stdio::null());
    cmd
}

/// SIGTERM first, SIGKILL if the child is still around after `grace`.
///
/// The container CLI forwards SIGTERM to the container it is attached to.
#[cfg(target_family = "unix")]
pub async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    if let Some(id) = child.id() {
        // SAFETY: signalling a pid we spawned and have not yet reaped.
        unsafe {
            libc::kill(id as libc::pid_t, libc::SIGTERM);
        }
        if tokio::time::timeout(grace, child.wait()).await.is_ok() {
            return Ok(());
        }
    }
    child.kill().await
}

#[cfg(target_family = "windows")]
pub async fn kill_graceful(child: &mut Child, _grace: Duration) -> std::io::Result<()> {
    child.kill().await
}

/// Exit code, or `128 + signal` for a child killed by a signal on Unix.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    cfg_if::cfg_if! {
        if #[cfg(target_family = "unix")] {
            use std::os::unix::process::ExitStatusExt;
            status.signal().map_or(-1, |sig| 128 + sig)
        } else {
            -1
        }
    }
}
