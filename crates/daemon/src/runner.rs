//! The check workflow: read config, parse the file URL, fetch the queue
//! file, dispatch each line as an SMS, delete the processed file, stamp the
//! run time. The control loop re-arms the trigger from the returned outcome.
//!
//! Failure policy: once started, the loop must never silently die on a
//! remote or network error. Any fetch/decode/send failure is transient
//! (journaled, timestamp stamped, next run kept). Only missing
//! configuration, an unparseable URL, or a fetched file with no body halt
//! the loop.

use anyhow::Result;
use chrono::Utc;
use gitsms_core::{dispatch, segment, FileRef, Journal};
use gitsms_github::{GithubClient, RemoteFile};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::sms::SmsSender;
use crate::state::StateFile;

/// Where a check run leaves the recurring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Normal completion, including transient remote failures: re-arm.
    Completed,
    /// File URL or token unset. Soft stop until the operator configures
    /// them; the run itself is not a failure.
    ConfigMissing,
    /// The configured URL does not parse. Halt.
    InvalidUrl,
    /// Fetch succeeded but the payload carried no content. Halt.
    MissingBody,
}

impl RunOutcome {
    pub fn reschedules(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Seam over the two remote file operations so tests can inject a fake.
pub trait FileSource {
    async fn fetch(&self, file: &FileRef) -> Result<RemoteFile>;
    async fn delete(&self, file: &FileRef, sha: &str, message: &str) -> Result<()>;
}

impl FileSource for GithubClient {
    async fn fetch(&self, file: &FileRef) -> Result<RemoteFile> {
        Ok(self.fetch_file(file).await?)
    }

    async fn delete(&self, file: &FileRef, sha: &str, message: &str) -> Result<()> {
        Ok(self.delete_file(file, sha, message).await?)
    }
}

/// One execution of the workflow, with its collaborators injected.
pub struct CheckRun<'a, F, S> {
    pub source: &'a F,
    pub sender: &'a S,
    pub journal: &'a Journal,
    pub state: &'a StateFile,
    pub config: &'a RelayConfig,
}

impl<F: FileSource, S: SmsSender> CheckRun<'_, F, S> {
    pub async fn execute(&self) -> RunOutcome {
        self.note("Check started.");

        if self.config.source.file_url.trim().is_empty() {
            self.note("ERROR: GitHub file URL is not configured. Run `gitsms config --file-url <url>`.");
            return RunOutcome::ConfigMissing;
        }
        if self.config.source.token.trim().is_empty() {
            self.note("ERROR: GitHub token is not configured. Run `gitsms config --token <token>`.");
            return RunOutcome::ConfigMissing;
        }
        self.note("Configuration found. Proceeding...");

        let file = match FileRef::parse(&self.config.source.file_url) {
            Ok(file) => file,
            Err(_) => {
                self.note("Error: Invalid GitHub URL format.");
                return RunOutcome::InvalidUrl;
            }
        };

        match self.process(&file).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Anything thrown past the fetch is still transient.
                self.note("ERROR: Exception occurred. Retrying next interval.");
                self.note(format!("Exception details: {err:#}"));
                self.stamp_last_run();
                RunOutcome::Completed
            }
        }
    }

    async fn process(&self, file: &FileRef) -> Result<RunOutcome> {
        self.note("Checking GitHub for file...");

        let remote = match self.source.fetch(file).await {
            Ok(remote) => remote,
            Err(err) => {
                self.note("ERROR: Unable to fetch file. Retrying next interval.");
                self.note(format!("Error details: {err:#}"));
                self.stamp_last_run();
                return Ok(RunOutcome::Completed);
            }
        };

        let Some(body) = remote.decode_body()? else {
            self.note("File is empty or content missing.");
            return Ok(RunOutcome::MissingBody);
        };

        self.note("File found! Processing content...");

        let lines = dispatch::parse_body(&body);
        let mut sent = 0usize;
        for line in &lines {
            let segments = segment::split_message(&line.message);
            match self.sender.send(&line.phone, &segments).await {
                Ok(()) => {
                    sent += 1;
                    self.note(format!("Sent to {}: \"{}\"", line.phone, line.message));
                }
                Err(err) => {
                    self.note(format!("Failed to send to {}: {err:#}", line.phone));
                }
            }
        }

        if sent > 0 {
            self.note("Deleting file from GitHub...");
            let message = format!("Processed {sent} SMS messages");
            match self.source.delete(file, &remote.sha, &message).await {
                Ok(()) => self.note("File deleted successfully."),
                Err(err) => self.note(format!("Failed to delete file: {err:#}")),
            }
        } else {
            self.note("No valid SMS lines found in file.");
        }

        self.stamp_last_run();
        Ok(RunOutcome::Completed)
    }

    fn stamp_last_run(&self) {
        let now_ms = Utc::now().timestamp_millis();
        if let Err(err) = self.state.update(|s| s.last_run_ms = now_ms) {
            warn!("Could not stamp last run time: {err:#}");
        }
    }

    fn note(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        if let Err(err) = self.journal.append(message) {
            warn!("Journal append failed: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use gitsms_core::{FileRef, Journal};
    use gitsms_github::RemoteFile;

    use super::{CheckRun, FileSource, RunOutcome};
    use crate::config::RelayConfig;
    use crate::sms::SmsSender;
    use crate::state::StateFile;

    enum FetchBehavior {
        Body(&'static str),
        NoContent,
        Http500,
    }

    struct FakeSource {
        behavior: FetchBehavior,
        fetches: AtomicUsize,
        deletes: Mutex<Vec<(String, String)>>,
    }

    impl FakeSource {
        fn new(behavior: FetchBehavior) -> Self {
            Self {
                behavior,
                fetches: AtomicUsize::new(0),
                deletes: Mutex::new(Vec::new()),
            }
        }
    }

    impl FileSource for FakeSource {
        async fn fetch(&self, _file: &FileRef) -> Result<RemoteFile> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                FetchBehavior::Body(text) => Ok(RemoteFile {
                    sha: "sha-1".to_string(),
                    content: Some(BASE64.encode(text)),
                }),
                FetchBehavior::NoContent => Ok(RemoteFile {
                    sha: "sha-1".to_string(),
                    content: None,
                }),
                FetchBehavior::Http500 => {
                    Err(anyhow!("GitHub API returned HTTP 500 Internal Server Error: oops"))
                }
            }
        }

        async fn delete(&self, _file: &FileRef, sha: &str, message: &str) -> Result<()> {
            self.deletes
                .lock()
                .unwrap()
                .push((sha.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct FakeSender {
        fail_phone: Option<&'static str>,
        sent: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeSender {
        fn new() -> Self {
            Self {
                fail_phone: None,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing_for(phone: &'static str) -> Self {
            Self {
                fail_phone: Some(phone),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl SmsSender for FakeSender {
        async fn send(&self, phone: &str, segments: &[String]) -> Result<()> {
            if self.fail_phone == Some(phone) {
                return Err(anyhow!("gateway rejected the message"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((phone.to_string(), segments.to_vec()));
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        journal: Journal,
        state: StateFile,
        config: RelayConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = Journal::open(dir.path().join("journal.json"));
        let state = StateFile::at(dir.path().join("state.json"));
        let mut config = RelayConfig::default();
        config.source.file_url =
            "https://github.com/octocat/queue/blob/main/sms.txt".to_string();
        config.source.token = "tok".to_string();
        Fixture {
            _dir: dir,
            journal,
            state,
            config,
        }
    }

    async fn run(fx: &Fixture, source: &FakeSource, sender: &FakeSender) -> RunOutcome {
        CheckRun {
            source,
            sender,
            journal: &fx.journal,
            state: &fx.state,
            config: &fx.config,
        }
        .execute()
        .await
    }

    fn journal_contains(journal: &Journal, needle: &str) -> bool {
        journal.entries().iter().any(|e| e.message.contains(needle))
    }

    #[tokio::test]
    async fn soft_stop_on_empty_token_skips_fetch() {
        let mut fx = fixture();
        fx.config.source.token = String::new();
        let source = FakeSource::new(FetchBehavior::Body("+1,hi"));
        let sender = FakeSender::new();

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::ConfigMissing);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(fx.state.load().last_run_ms, 0);
        assert!(journal_contains(&fx.journal, "token is not configured"));
    }

    #[tokio::test]
    async fn invalid_url_halts_without_fetch() {
        let mut fx = fixture();
        fx.config.source.file_url = "https://example.com/not/github".to_string();
        let source = FakeSource::new(FetchBehavior::Body("+1,hi"));
        let sender = FakeSender::new();

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::InvalidUrl);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(journal_contains(&fx.journal, "Invalid GitHub URL format"));
    }

    #[tokio::test]
    async fn fetch_failure_is_transient() {
        let fx = fixture();
        let source = FakeSource::new(FetchBehavior::Http500);
        let sender = FakeSender::new();

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(outcome.reschedules());
        assert!(fx.state.load().last_run_ms > 0);
        assert!(journal_contains(&fx.journal, "Unable to fetch file"));
        assert!(journal_contains(&fx.journal, "HTTP 500"));
        assert!(source.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_body_halts_without_stamping() {
        let fx = fixture();
        let source = FakeSource::new(FetchBehavior::NoContent);
        let sender = FakeSender::new();

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::MissingBody);
        assert!(!outcome.reschedules());
        assert_eq!(fx.state.load().last_run_ms, 0);
        assert!(journal_contains(&fx.journal, "empty or content missing"));
    }

    #[tokio::test]
    async fn no_valid_lines_means_no_delete() {
        let fx = fixture();
        let source = FakeSource::new(FetchBehavior::Body("not a record\n,\n"));
        let sender = FakeSender::new();

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert!(source.deletes.lock().unwrap().is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
        assert!(journal_contains(&fx.journal, "No valid SMS lines"));
        assert!(fx.state.load().last_run_ms > 0);
    }

    #[tokio::test]
    async fn dispatched_lines_trigger_delete_with_fetch_sha() {
        let fx = fixture();
        let source = FakeSource::new(FetchBehavior::Body("+15551234,Hello, world\n"));
        let sender = FakeSender::new();

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::Completed);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+15551234");
        assert_eq!(sent[0].1, vec!["Hello, world".to_string()]);

        let deletes = source.deletes.lock().unwrap();
        assert_eq!(
            deletes.as_slice(),
            &[("sha-1".to_string(), "Processed 1 SMS messages".to_string())]
        );
    }

    #[tokio::test]
    async fn send_failure_does_not_abort_remaining_lines() {
        let fx = fixture();
        let source = FakeSource::new(FetchBehavior::Body("+1,first\n+2,second\n"));
        let sender = FakeSender::failing_for("+1");

        let outcome = run(&fx, &source, &sender).await;

        assert_eq!(outcome, RunOutcome::Completed);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+2");
        assert!(journal_contains(&fx.journal, "Failed to send to +1"));

        // Only the delivered line counts toward the delete message.
        let deletes = source.deletes.lock().unwrap();
        assert_eq!(deletes[0].1, "Processed 1 SMS messages");
    }
}
