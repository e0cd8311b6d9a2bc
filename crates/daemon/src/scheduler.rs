//! The self-rearming one-shot timer and the daemon control loop.
//!
//! The relay is not truly periodic: after each check, exactly one future
//! trigger is armed, and only while the service is running. Stopping cancels
//! the pending trigger; an in-flight check finishes and then observes
//! running=false.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use gitsms_core::Journal;
use gitsms_github::GithubClient;
use tokio::time::{sleep_until, Instant};
use tracing::{error, info};

use crate::config::{self, RelayConfig};
use crate::runner::CheckRun;
use crate::sms::HttpGateway;
use crate::state::{self, StateFile};

/// One-shot wake-up. `fired()` resolves at the armed deadline and pends
/// forever while disarmed, so it composes directly into `tokio::select!`.
#[derive(Debug, Default)]
pub struct Trigger {
    deadline: Option<Instant>,
}

impl Trigger {
    pub fn arm(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    /// Idempotent; disarming an unarmed trigger is a no-op.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub async fn fired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}

enum Event {
    Timer,
    RunNow,
    Shutdown,
}

#[cfg(unix)]
struct SignalStreams {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sighup: tokio::signal::unix::Signal,
}

#[cfg(not(unix))]
struct SignalStreams;

impl SignalStreams {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigterm: signal(SignalKind::terminate()).context("register SIGTERM")?,
                sigint: signal(SignalKind::interrupt()).context("register SIGINT")?,
                sighup: signal(SignalKind::hangup()).context("register SIGHUP")?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self)
        }
    }
}

async fn next_event(trigger: &Trigger, signals: &mut SignalStreams) -> Event {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = trigger.fired() => Event::Timer,
            _ = signals.sighup.recv() => Event::RunNow,
            _ = signals.sigterm.recv() => Event::Shutdown,
            _ = signals.sigint.recv() => Event::Shutdown,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signals;
        tokio::select! {
            _ = trigger.fired() => Event::Timer,
            _ = tokio::signal::ctrl_c() => Event::Shutdown,
        }
    }
}

/// Run the relay daemon in the foreground until a shutdown signal.
pub async fn run_daemon() -> Result<()> {
    info!("gitsms daemon starting");

    let journal = Journal::open(state::journal_path()?);
    let state = StateFile::default_location()?;
    let mut signals = SignalStreams::new()?;

    write_pid_file()?;

    // Service start: fresh journal, running flag up, countdown baseline now.
    let _ = journal.clear();
    state.update(|s| {
        s.running = true;
        s.checking = false;
        s.last_run_ms = Utc::now().timestamp_millis();
    })?;
    if let Err(e) = journal.append("Service started.") {
        error!("Journal write failed: {e:#}");
    }

    let mut trigger = Trigger::default();

    // Immediate first check, then loop on trigger / run-now / shutdown.
    run_check_cycle(&journal, &state, &mut trigger).await;

    loop {
        match next_event(&trigger, &mut signals).await {
            Event::Timer => {
                trigger.cancel();
                let _ = journal.append("Timer fired. Triggering check...");
                run_check_cycle(&journal, &state, &mut trigger).await;
            }
            Event::RunNow => {
                // Supersede, never queue: the pending trigger is dropped and
                // re-armed after this check.
                trigger.cancel();
                let _ = journal.append("Immediate check requested.");
                run_check_cycle(&journal, &state, &mut trigger).await;
            }
            Event::Shutdown => {
                info!("Shutdown signal received, stopping...");
                break;
            }
        }
    }

    trigger.cancel();
    state.update(|s| {
        s.running = false;
        s.checking = false;
    })?;
    let _ = journal.append("Service stopped by user.");
    cleanup_pid_file();

    info!("gitsms daemon stopped");
    Ok(())
}

/// Execute one check and re-arm the trigger if the outcome allows it and the
/// service is still marked running.
async fn run_check_cycle(journal: &Journal, state: &StateFile, trigger: &mut Trigger) {
    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Could not load config: {e:#}");
            let _ = journal.append(format!("ERROR: Could not load config: {e:#}"));
            return;
        }
    };

    let _ = state.update(|s| s.checking = true);
    let outcome = execute_check(&config, journal, state).await;
    let _ = state.update(|s| s.checking = false);

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Check setup failed: {e:#}");
            let _ = journal.append(format!("ERROR: Check setup failed: {e:#}"));
            return;
        }
    };

    if outcome.reschedules() && state.load().running {
        let minutes = config.relay.interval_minutes;
        trigger.arm(Duration::from_secs(minutes * 60));
        let _ = journal.append(format!("Next run scheduled in {minutes} minutes."));
        info!("Next run scheduled in {minutes} minutes");
    }
}

async fn execute_check(
    config: &RelayConfig,
    journal: &Journal,
    state: &StateFile,
) -> Result<crate::runner::RunOutcome> {
    // Clients are rebuilt per check so config edits apply on the next run
    // without a daemon restart.
    let source = GithubClient::new(&config.source.token).context("build GitHub client")?;
    let sender = HttpGateway::new(&config.gateway)?;
    let run = CheckRun {
        source: &source,
        sender: &sender,
        journal,
        state,
        config,
    };
    Ok(run.execute().await)
}

/// Write PID file so the CLI can find us
fn write_pid_file() -> Result<()> {
    let path = state::pid_file_path()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, std::process::id().to_string())?;
    info!("PID file written: {}", path.display());
    Ok(())
}

/// Remove PID file on clean shutdown
fn cleanup_pid_file() {
    if let Ok(path) = state::pid_file_path() {
        let _ = std::fs::remove_file(path);
    }
}
