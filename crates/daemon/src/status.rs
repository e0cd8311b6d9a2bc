//! Status rendering: the countdown line is a pure function of persisted
//! state, recomputed on demand (or on a 1 s tick with `--watch`).

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use gitsms_core::Journal;

use crate::ctl;
use crate::state::{self, StateFile};

const RECENT_LOG_LINES: usize = 10;

/// Derive the status line shown to the operator.
pub fn status_line(
    running: bool,
    checking: bool,
    last_run_ms: i64,
    interval_minutes: u64,
    now_ms: i64,
) -> String {
    if !running {
        return "Service Stopped".to_string();
    }
    if checking {
        return "Status: Running check...".to_string();
    }
    if last_run_ms == 0 {
        return "Next run in: Calculating...".to_string();
    }

    let next_run_ms = last_run_ms + (interval_minutes as i64) * 60_000;
    let diff = next_run_ms - now_ms;
    if diff > 0 {
        let minutes = diff / 60_000;
        let seconds = (diff / 1000) % 60;
        format!("Next run in: {minutes:02}:{seconds:02}")
    } else {
        // Between the trigger firing and the check actually starting.
        "Status: Waiting for system execution...".to_string()
    }
}

/// `gitsms status [--watch]`.
pub async fn run_status(watch: bool) -> Result<()> {
    let config = crate::config::load_config()?;
    let state = StateFile::default_location()?;
    let journal = Journal::open(state::journal_path()?);

    match ctl::daemon_alive()? {
        Some(pid) => println!("Daemon is running (PID {pid})"),
        None => println!("Daemon is not running"),
    }

    if !watch {
        println!("{}", current_line(&state, config.relay.interval_minutes));
        print_recent_logs(&journal);
        return Ok(());
    }

    let mut interval_minutes = config.relay.interval_minutes;
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                // Pick up interval edits made while watching.
                if let Ok(fresh) = crate::config::load_config() {
                    interval_minutes = fresh.relay.interval_minutes;
                }
                let line = current_line(&state, interval_minutes);
                print!("\r\x1b[2K{line}");
                let _ = std::io::stdout().flush();
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
        }
    }
}

fn current_line(state: &StateFile, interval_minutes: u64) -> String {
    let s = state.load();
    status_line(
        s.running,
        s.checking,
        s.last_run_ms,
        interval_minutes,
        Utc::now().timestamp_millis(),
    )
}

fn print_recent_logs(journal: &Journal) {
    let entries = journal.entries();
    if entries.is_empty() {
        return;
    }
    println!("\nRecent activity:");
    let skip = entries.len().saturating_sub(RECENT_LOG_LINES);
    for entry in entries.iter().skip(skip) {
        println!("  {}  {}", entry.timestamp, entry.message);
    }
}

#[cfg(test)]
mod tests {
    use super::status_line;

    const MIN: i64 = 60_000;

    #[test]
    fn stopped_service_wins_over_everything() {
        assert_eq!(status_line(false, true, 1000, 15, 2000), "Service Stopped");
    }

    #[test]
    fn checking_is_reported_while_a_run_executes() {
        assert_eq!(
            status_line(true, true, 1000, 15, 2000),
            "Status: Running check..."
        );
    }

    #[test]
    fn no_recorded_run_shows_calculating() {
        assert_eq!(
            status_line(true, false, 0, 15, 2000),
            "Next run in: Calculating..."
        );
    }

    #[test]
    fn countdown_is_minutes_and_seconds() {
        // 15 min interval, 90.5 s elapsed: 13:29 remaining (floor).
        let now = 10 * MIN;
        let last_run = now - 90_500;
        assert_eq!(status_line(true, false, last_run, 15, now), "Next run in: 13:29");
    }

    #[test]
    fn countdown_pads_to_two_digits() {
        let now = 100 * MIN;
        let last_run = now - 15 * MIN + 5_000;
        assert_eq!(status_line(true, false, last_run, 15, now), "Next run in: 00:05");
    }

    #[test]
    fn countdown_tracks_the_configured_interval() {
        // The same recorded run renders differently once the interval changes,
        // so the watch loop must feed the line the freshly loaded value.
        let now = 100 * MIN;
        let last_run = now - 2 * MIN;
        assert_eq!(status_line(true, false, last_run, 15, now), "Next run in: 13:00");
        assert_eq!(status_line(true, false, last_run, 30, now), "Next run in: 28:00");
    }

    #[test]
    fn overdue_run_shows_waiting_for_execution() {
        let now = 100 * MIN;
        let last_run = now - 16 * MIN;
        assert_eq!(
            status_line(true, false, last_run, 15, now),
            "Status: Waiting for system execution..."
        );
    }
}
