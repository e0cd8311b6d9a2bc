//! Process control for the background daemon: the `start`/`stop`/`run-now`
//! subcommands drive a detached `gitsms run` process through a PID file.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::state::pid_file_path;

/// Start the daemon process
pub fn daemon_start() -> Result<()> {
    let pid_path = pid_file_path()?;
    match pid_record(&pid_path)? {
        PidRecord::Alive(pid) => {
            println!("Daemon is already running (PID {})", pid);
            return Ok(());
        }
        PidRecord::Stale(_) => {
            let _ = std::fs::remove_file(&pid_path);
        }
        PidRecord::Missing => {}
    }

    let exe = std::env::current_exe().context("Could not locate own binary")?;

    println!("Starting gitsms daemon...");

    let child = std::process::Command::new(&exe)
        .arg("run")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .stdin(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to start daemon at {}", exe.display()))?;

    let pid = child.id();
    if let Some(dir) = pid_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&pid_path, pid.to_string()).context("Failed to write PID file")?;

    println!("Daemon started (PID {})", pid);
    Ok(())
}

/// Stop the daemon process
pub fn daemon_stop() -> Result<()> {
    let pid_path = pid_file_path()?;
    let pid = match pid_record(&pid_path)? {
        PidRecord::Missing => {
            println!("Daemon is not running (no PID file)");
            return Ok(());
        }
        PidRecord::Stale(pid) => {
            println!("Daemon is not running (stale PID {})", pid);
            let _ = std::fs::remove_file(&pid_path);
            return Ok(());
        }
        PidRecord::Alive(pid) => pid,
    };

    println!("Stopping daemon (PID {})...", pid);

    signal_process(pid, StopSignal::Terminate)?;

    // Wait briefly and verify
    std::thread::sleep(std::time::Duration::from_secs(2));

    if process_alive(pid) {
        bail!("Daemon did not stop (PID {}). Try killing it manually.", pid);
    }

    let _ = std::fs::remove_file(&pid_path);
    println!("Daemon stopped.");
    Ok(())
}

/// Ask the running daemon for an immediate check, superseding its pending
/// timer.
pub fn daemon_run_now() -> Result<()> {
    let PidRecord::Alive(pid) = pid_record(&pid_file_path()?)? else {
        bail!("Daemon is not running. Start it with `gitsms start`.");
    };

    signal_process(pid, StopSignal::RunNow)?;
    println!("Immediate check requested (PID {})", pid);
    Ok(())
}

/// Whether the daemon process behind the PID file is alive.
pub fn daemon_alive() -> Result<Option<u32>> {
    Ok(match pid_record(&pid_file_path()?)? {
        PidRecord::Alive(pid) => Some(pid),
        _ => None,
    })
}

enum StopSignal {
    Terminate,
    RunNow,
}

#[cfg(unix)]
fn signal_process(pid: u32, signal: StopSignal) -> Result<()> {
    let sig = match signal {
        StopSignal::Terminate => libc::SIGTERM,
        StopSignal::RunNow => libc::SIGHUP,
    };
    // SAFETY: kill(2) with a valid signal number; the worst outcome for a
    // recycled PID is a spurious signal to an unrelated process we own.
    let rc = unsafe { libc::kill(pid as i32, sig) };
    if rc != 0 {
        bail!("Failed to signal PID {}", pid);
    }
    Ok(())
}

#[cfg(not(unix))]
fn signal_process(pid: u32, signal: StopSignal) -> Result<()> {
    match signal {
        StopSignal::Terminate => {
            let _ = std::process::Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .output();
            Ok(())
        }
        StopSignal::RunNow => bail!("run-now is not supported on this platform"),
    }
}

/// What the PID file says, cross-checked against a liveness probe.
enum PidRecord {
    Missing,
    Stale(u32),
    Alive(u32),
}

fn pid_record(path: &Path) -> Result<PidRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(PidRecord::Missing);
        }
        Err(err) => return Err(err).context("Failed to read PID file"),
    };
    let pid: u32 = content.trim().parse().context("Invalid PID in pid file")?;
    Ok(if process_alive(pid) {
        PidRecord::Alive(pid)
    } else {
        PidRecord::Stale(pid)
    })
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // Signal 0 probes existence without delivering anything.
    // SAFETY: kill(2) with signal 0 only runs the permission check.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    std::process::Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .is_ok_and(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
}
