use crate::infra::join_error;
use chrono::{Duration, Utc};
use clap::Args;
use hirely::board::{
    pricing_tier, BoardRepository, CompanyInput, JobBoardService, JobPostId, JobPostInput,
    JobPostStatus, JobSeekerInput, UserId,
};
use hirely::error::AppError;
use hirely::notifications::{MailError, Mailer, OutboundEmail};
use hirely::persistence::SqliteStore;
use hirely::workflows::{
    DigestSchedule, JobExpiration, JobListingDigest, RunStatus, StepRunner, WorkflowStore,
};
use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DEMO_CUSTOMER: &str = "cus_demo";
const DEMO_PUBLIC_URL: &str = "http://localhost:3000";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Listing duration in days (30, 60 or 90)
    #[arg(long, default_value_t = 30)]
    pub(crate) duration: u32,
    /// Skip the job seeker digest portion of the demo
    #[arg(long)]
    pub(crate) skip_digest: bool,
}

/// Prints digest emails instead of sending them.
#[derive(Default)]
struct ConsoleMailer {
    sent: AtomicUsize,
}

impl Mailer for ConsoleMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        println!("    mail -> {}: {}", email.to.join(", "), email.subject);
        Ok(())
    }
}

type DemoBoard = JobBoardService<SqliteStore, StepRunner<SqliteStore>>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || simulate(args))
        .await
        .map_err(join_error)?
}

fn simulate(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        duration,
        skip_digest,
    } = args;

    let Some(tier) = pricing_tier(duration) else {
        println!("No pricing tier for {duration} days; choose 30, 60 or 90.");
        return Ok(());
    };

    let store = Arc::new(SqliteStore::in_memory()?);
    let mailer = Arc::new(ConsoleMailer::default());
    let mut runner = StepRunner::new(store.clone());
    runner.register(Arc::new(JobExpiration::new(store.clone())));
    runner.register(Arc::new(
        JobListingDigest::new(store.clone(), mailer.clone(), DEMO_PUBLIC_URL)
            .with_schedule(DigestSchedule::new(duration.min(6), 2, 5)),
    ));
    let runner = Arc::new(runner);
    let board: DemoBoard = JobBoardService::new(store.clone(), runner.clone());

    println!("Hirely lifecycle demo (in-memory database, simulated clock)");

    let owner = UserId::from("demo-owner");
    let Some(_) = report(
        "register company owner",
        board.register_user(owner.clone(), "owner@example.com", "Demo Owner"),
    ) else {
        return Ok(());
    };
    let Some(company) = report(
        "onboard company",
        board.onboard_company(
            &owner,
            CompanyInput {
                name: "Demo Labs".to_string(),
                location: "Germany".to_string(),
                about: "A small remote-first engineering team.".to_string(),
                logo: "https://cdn.example.com/demo-labs.png".to_string(),
                website: "https://demo-labs.example.com".to_string(),
                x_account: None,
            },
        ),
    ) else {
        return Ok(());
    };
    store.set_customer_id(&owner, DEMO_CUSTOMER)?;
    println!("- Company {} onboarded", company.name);

    let Some(job) = report(
        "create listing",
        board.create_job(
            JobPostInput {
                job_title: "Backend Engineer".to_string(),
                employment_type: "full-time".to_string(),
                location: "Germany".to_string(),
                salary_from: 6_000,
                salary_to: 8_500,
                job_description: "Build and operate the listing pipeline.".to_string(),
                listing_duration: duration,
                benefits: vec!["async".to_string(), "learning_budget".to_string()],
            },
            &owner,
        ),
    ) else {
        return Ok(());
    };
    println!(
        "- Listing {} created as {} ({} days, ${} {})",
        job.id,
        job.status.as_str(),
        tier.days,
        tier.price,
        tier.description
    );

    if !skip_digest {
        let seeker = UserId::from("demo-seeker");
        let onboarded = report(
            "register job seeker",
            board.register_user(seeker.clone(), "seeker@example.com", "Demo Seeker"),
        )
        .and_then(|_| {
            report(
                "onboard job seeker",
                board.onboard_job_seeker(
                    &seeker,
                    JobSeekerInput {
                        name: "Demo Seeker".to_string(),
                        about: "Backend developer looking for remote roles.".to_string(),
                        resume: "https://files.example.com/demo-seeker.pdf".to_string(),
                    },
                ),
            )
        });
        if onboarded.is_some() {
            println!("- Job seeker onboarded; digest workflow queued");
        }
    }

    let start = Utc::now();
    let first = runner.tick(start)?;
    println!(
        "- Day 0: {} run(s) started, {} sleeping",
        first.processed, first.sleeping
    );

    match report("confirm payment", board.confirm_payment(DEMO_CUSTOMER, &job.id)) {
        Some(outcome) => println!("- Payment webhook applied: {outcome:?}"),
        None => return Ok(()),
    }
    print_status(&board, &job.id)?;

    for day in 1..=i64::from(duration) {
        let tick = runner.tick(start + Duration::days(day))?;
        if tick.processed > 0 {
            println!(
                "- Day {day}: {} completed, {} sleeping, {} retried, {} failed",
                tick.completed, tick.sleeping, tick.retried, tick.failed
            );
        }
    }
    print_status(&board, &job.id)?;

    let completed = store.runs_with_status(RunStatus::Completed)?;
    println!("Completed workflow runs");
    for run in completed {
        let output = run
            .output
            .map(|output| output.to_string())
            .unwrap_or_default();
        println!("  - {} -> {}", run.function_id, output);
    }
    println!(
        "Digest emails printed: {}",
        mailer.sent.load(Ordering::SeqCst)
    );

    Ok(())
}

fn report<T, E: Display>(label: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            println!("  {label} failed: {err}");
            None
        }
    }
}

fn print_status(board: &DemoBoard, job_id: &JobPostId) -> Result<(), AppError> {
    let status = board
        .repository()
        .job(job_id)?
        .map(|job| job.status)
        .map(JobPostStatus::as_str)
        .unwrap_or("MISSING");
    println!("  listing status: {status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_runs_the_full_lifecycle() {
        simulate(DemoArgs {
            duration: 30,
            skip_digest: false,
        })
        .expect("demo completes");
    }

    #[test]
    fn unknown_duration_is_reported_not_failed() {
        simulate(DemoArgs {
            duration: 45,
            skip_digest: true,
        })
        .expect("demo exits cleanly");
    }
}
