use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde_json::json;

use crate::board::domain::{EmploymentType, JobPostStatus};
use crate::board::tests::common::*;
use crate::board::JobBoardService;
use crate::notifications::{MailError, Mailer, OutboundEmail, DIGEST_SUBJECT};
use crate::persistence::SqliteStore;
use crate::workflows::{
    DigestSchedule, JobExpiration, JobListingDigest, RunStatus, StepRunner, WorkflowRun,
    WorkflowStore,
};

/// Mailer that records deliveries and can be told to fail the next few sends.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failures_left: AtomicUsize,
}

impl RecordingMailer {
    fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(MailError::Transport("smtp relay down".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

struct Harness {
    repository: Arc<MemoryRepository>,
    store: Arc<SqliteStore>,
    runner: Arc<StepRunner<SqliteStore>>,
    mailer: Arc<RecordingMailer>,
    board: JobBoardService<MemoryRepository, StepRunner<SqliteStore>>,
}

fn harness(mailer: RecordingMailer, schedule: DigestSchedule) -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let store = Arc::new(SqliteStore::in_memory().expect("in-memory store"));
    let mailer = Arc::new(mailer);

    let mut runner = StepRunner::new(store.clone());
    runner.register(Arc::new(JobExpiration::new(repository.clone())));
    runner.register(Arc::new(
        JobListingDigest::new(repository.clone(), mailer.clone(), "https://jobs.example.com")
            .with_schedule(schedule),
    ));
    let runner = Arc::new(runner);
    let board = JobBoardService::new(repository.clone(), runner.clone());

    Harness {
        repository,
        store,
        runner,
        mailer,
        board,
    }
}

fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn only_run(store: &SqliteStore, status: RunStatus) -> WorkflowRun {
    let mut runs = store.runs_with_status(status).expect("runs");
    assert_eq!(runs.len(), 1, "expected one {} run", status.as_str());
    runs.remove(0)
}

#[test]
fn paid_listing_expires_after_its_window() {
    let h = harness(RecordingMailer::default(), DigestSchedule::default());
    let (owner, _) = company_owner(&h.board, "owner-1", "Acme");
    attach_customer(&h.repository, &owner, "cus_1");
    let job = h.board.create_job(job_input(30), &owner).expect("job created");
    h.board.confirm_payment("cus_1", &job.id).expect("paid");
    let start = timestamp();

    assert_eq!(h.runner.tick(start).expect("tick").sleeping, 1);
    let sleeping = only_run(&h.store, RunStatus::Sleeping);
    assert_eq!(sleeping.function_id, JobExpiration::<MemoryRepository>::ID);
    assert_eq!(
        sleeping.wake_at,
        (job.created_at + Duration::days(30)).trunc_subsecs(6)
    );

    h.runner
        .tick(start + Duration::days(29))
        .expect("early tick");
    assert_eq!(h.repository.status_of(&job.id), Some(JobPostStatus::Active));

    let report = h.runner.tick(start + Duration::days(30)).expect("tick");
    assert_eq!(report.completed, 1);
    assert_eq!(h.repository.status_of(&job.id), Some(JobPostStatus::Expired));

    let done = only_run(&h.store, RunStatus::Completed);
    let output = done.output.expect("output");
    assert_eq!(output["jobId"], json!(job.id));
    assert_eq!(output["outcome"], "expired");
    assert_eq!(output["message"], "Job marked as expired");
}

#[test]
fn late_first_tick_does_not_extend_the_listing_window() {
    let h = harness(RecordingMailer::default(), DigestSchedule::default());
    let (owner, _) = company_owner(&h.board, "owner-1", "Acme");
    attach_customer(&h.repository, &owner, "cus_1");
    let job = h.board.create_job(job_input(30), &owner).expect("job created");
    h.board.confirm_payment("cus_1", &job.id).expect("paid");
    let created = job.created_at;

    assert_eq!(
        h.runner
            .tick(created + Duration::days(1))
            .expect("delayed tick")
            .sleeping,
        1
    );
    assert_eq!(
        only_run(&h.store, RunStatus::Sleeping).wake_at,
        (created + Duration::days(30)).trunc_subsecs(6)
    );

    h.runner
        .tick(created + Duration::days(30) + Duration::hours(1))
        .expect("expiry tick");
    assert_eq!(h.repository.status_of(&job.id), Some(JobPostStatus::Expired));
}

#[test]
fn unpaid_draft_also_expires() {
    let h = harness(RecordingMailer::default(), DigestSchedule::default());
    let (owner, _) = company_owner(&h.board, "owner-1", "Acme");
    let job = h.board.create_job(job_input(60), &owner).expect("job created");
    let start = timestamp();

    h.runner.tick(start).expect("tick");
    h.runner.tick(start + Duration::days(60)).expect("tick");

    assert_eq!(h.repository.status_of(&job.id), Some(JobPostStatus::Expired));
}

#[test]
fn deleted_listing_completes_expiration_as_missing() {
    let h = harness(RecordingMailer::default(), DigestSchedule::default());
    let (owner, _) = company_owner(&h.board, "owner-1", "Acme");
    let job = h.board.create_job(job_input(30), &owner).expect("job created");
    let start = timestamp();
    h.runner.tick(start).expect("tick");

    h.board.delete_job(&job.id, &owner).expect("deleted");
    let report = h.runner.tick(start + Duration::days(30)).expect("tick");

    assert_eq!(report.completed, 1);
    assert_eq!(h.repository.job_count(), 0);
    let done = only_run(&h.store, RunStatus::Completed);
    assert_eq!(done.output.expect("output")["outcome"], "missing");
}

#[test]
fn digest_mails_recent_listings_on_each_interval() {
    let h = harness(RecordingMailer::default(), DigestSchedule::new(6, 2, 2));
    let (_, company) = company_owner(&h.board, "owner-1", "Acme");
    for (title, minutes) in [("Oldest", 30), ("Middle", 20), ("Newest", 10)] {
        seed_job(
            &h.repository,
            &company,
            title,
            JobPostStatus::Active,
            EmploymentType::FullTime,
            "worldwide",
            minutes,
        );
    }
    let reader = seeker(&h.board, "seeker-1");
    h.board
        .onboard_job_seeker(&reader, seeker_input())
        .expect("onboarded");
    let start = timestamp();

    h.runner.tick(start).expect("tick");
    assert!(h.mailer.sent().is_empty());

    for day in [2, 4] {
        let report = h.runner.tick(start + Duration::days(day)).expect("tick");
        assert_eq!(report.sleeping, 1, "day {day}");
    }
    let report = h.runner.tick(start + Duration::days(6)).expect("tick");
    assert_eq!(report.completed, 1);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].to, vec!["seeker-1@example.com".to_string()]);
    assert_eq!(sent[0].subject, DIGEST_SUBJECT);
    assert!(sent[0].html.contains("Newest"));
    assert!(sent[0].html.contains("Middle"));
    assert!(!sent[0].html.contains("Oldest"));
    assert!(sent[0].html.contains("https://jobs.example.com/job/"));

    let done = only_run(&h.store, RunStatus::Completed);
    let output = done.output.expect("output");
    assert_eq!(output["userId"], "seeker-1");
    assert_eq!(output["emailsSent"], 3);
    assert_eq!(output["message"], "Completed 6 day job listing notifications");
}

#[test]
fn digest_skips_intervals_without_listings() {
    let h = harness(RecordingMailer::default(), DigestSchedule::new(4, 2, 5));
    let reader = seeker(&h.board, "seeker-1");
    h.board
        .onboard_job_seeker(&reader, seeker_input())
        .expect("onboarded");
    let start = timestamp();

    h.runner.tick(start).expect("tick");
    h.runner.tick(start + Duration::days(2)).expect("tick");
    h.runner.tick(start + Duration::days(4)).expect("tick");

    assert!(h.mailer.sent().is_empty());
    let done = only_run(&h.store, RunStatus::Completed);
    assert_eq!(done.output.expect("output")["emailsSent"], 0);
}

#[test]
fn failed_send_is_retried_without_refetching() {
    let h = harness(RecordingMailer::failing(1), DigestSchedule::new(2, 2, 5));
    let (_, company) = company_owner(&h.board, "owner-1", "Acme");
    seed_job(
        &h.repository,
        &company,
        "First Listing",
        JobPostStatus::Active,
        EmploymentType::Contract,
        "worldwide",
        5,
    );
    let reader = seeker(&h.board, "seeker-1");
    h.board
        .onboard_job_seeker(&reader, seeker_input())
        .expect("onboarded");
    let start = timestamp();

    h.runner.tick(start).expect("tick");
    let wake = start + Duration::days(2);
    let report = h.runner.tick(wake).expect("tick");
    assert_eq!(report.retried, 1);

    // Listed after the fetch step completed; must not appear in the retried email.
    seed_job(
        &h.repository,
        &company,
        "Late Listing",
        JobPostStatus::Active,
        EmploymentType::Contract,
        "worldwide",
        0,
    );
    let report = h
        .runner
        .tick(wake + Duration::seconds(30))
        .expect("retry tick");
    assert_eq!(report.completed, 1);

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains("First Listing"));
    assert!(!sent[0].html.contains("Late Listing"));
}

#[test]
fn digest_for_vanished_user_ends_early() {
    let h = harness(RecordingMailer::default(), DigestSchedule::default());
    let now = timestamp();
    h.store
        .insert_run(&WorkflowRun::queued(
            JobListingDigest::<MemoryRepository, RecordingMailer>::ID,
            crate::workflows::WorkflowEvent::job_seeker_created(&"ghost".into(), now),
            now,
        ))
        .expect("insert");

    assert_eq!(h.runner.tick(now).expect("tick").completed, 1);
    let done = only_run(&h.store, RunStatus::Completed);
    assert_eq!(done.output.expect("output")["emailsSent"], 0);
    assert!(h.mailer.sent().is_empty());
}
