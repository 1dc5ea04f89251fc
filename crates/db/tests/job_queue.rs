//! Integration tests for the generation job queue.
//!
//! Exercises the repository against a real database:
//! - Submission validation and defaults
//! - Claim atomicity under concurrent callers
//! - Priority and tie-break ordering
//! - Retry accounting and exhaustion
//! - Delayed scheduling, cancellation, reaping, retention cleanup

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use sqlx::PgPool;

use reelforge_core::scheduling::{JobKind, PRIORITY_LOW, PRIORITY_NORMAL, PRIORITY_URGENT};
use reelforge_db::error::QueueError;
use reelforge_db::models::job::{JobListQuery, SubmitJob};
use reelforge_db::models::status::JobStatus;
use reelforge_db::models::user::CreateUser;
use reelforge_db::repositories::{JobRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            display_name: "Studio".to_string(),
        },
    )
    .await
    .unwrap()
    .id
}

fn submit_input(job_type: &str) -> SubmitJob {
    SubmitJob {
        job_type: job_type.to_string(),
        payload: serde_json::json!({"prompt": "castle at dusk"}),
        priority: None,
        max_attempts: None,
        scheduled_for: None,
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn submit_applies_defaults(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();

    assert_eq!(job.status_id, JobStatus::Pending.id());
    assert_eq!(job.priority, PRIORITY_NORMAL);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_attempts, 3);
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());
    assert!(job.scheduled_for <= Utc::now());
}

#[sqlx::test]
async fn submit_rejects_unknown_kind(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    let err = JobRepo::submit(&pool, owner, &submit_input("hologram_generation"))
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::UnknownKind(_));
}

#[sqlx::test]
async fn submit_rejects_unknown_priority_weight(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    let mut input = submit_input("image_generation");
    input.priority = Some(7);
    let err = JobRepo::submit(&pool, owner, &input).await.unwrap_err();
    assert_matches!(err, QueueError::InvalidPriority(7));
}

#[sqlx::test]
async fn submit_rejects_zero_max_attempts(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    let mut input = submit_input("image_generation");
    input.max_attempts = Some(0);
    let err = JobRepo::submit(&pool, owner, &input).await.unwrap_err();
    assert_matches!(err, QueueError::InvalidMaxAttempts(0));
}

#[sqlx::test]
async fn submit_rejects_unknown_owner(pool: PgPool) {
    let err = JobRepo::submit(&pool, 9999, &submit_input("image_generation"))
        .await
        .unwrap_err();
    assert_matches!(err, QueueError::Database(_));
}

// ---------------------------------------------------------------------------
// Claiming
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn claim_returns_none_on_empty_queue(pool: PgPool) {
    assert!(JobRepo::claim(&pool, None).await.unwrap().is_none());
}

#[sqlx::test]
async fn claim_transitions_and_counts_the_attempt(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();

    let claimed = JobRepo::claim(&pool, None).await.unwrap().unwrap();

    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status_id, JobStatus::Processing.id());
    assert_eq!(claimed.attempts, 1);
    assert!(claimed.started_at.is_some());
}

#[sqlx::test]
async fn claim_orders_by_priority(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let when = Utc::now() - chrono::Duration::minutes(5);

    for priority in [PRIORITY_LOW, PRIORITY_NORMAL, PRIORITY_URGENT] {
        let mut input = submit_input("image_generation");
        input.priority = Some(priority);
        input.scheduled_for = Some(when);
        JobRepo::submit(&pool, owner, &input).await.unwrap();
    }

    let first = JobRepo::claim(&pool, None).await.unwrap().unwrap();
    let second = JobRepo::claim(&pool, None).await.unwrap().unwrap();
    let third = JobRepo::claim(&pool, None).await.unwrap().unwrap();

    assert_eq!(first.priority, PRIORITY_URGENT);
    assert_eq!(second.priority, PRIORITY_NORMAL);
    assert_eq!(third.priority, PRIORITY_LOW);
}

#[sqlx::test]
async fn claim_breaks_ties_by_insertion_order(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let when = Utc::now() - chrono::Duration::minutes(5);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let mut input = submit_input("image_generation");
        input.scheduled_for = Some(when);
        ids.push(JobRepo::submit(&pool, owner, &input).await.unwrap().id);
    }

    for expected in ids {
        let claimed = JobRepo::claim(&pool, None).await.unwrap().unwrap();
        assert_eq!(claimed.id, expected);
    }
}

#[sqlx::test]
async fn claim_skips_future_scheduled_jobs(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    let mut input = submit_input("image_generation");
    input.scheduled_for = Some(Utc::now() + chrono::Duration::hours(1));
    JobRepo::submit(&pool, owner, &input).await.unwrap();

    assert!(JobRepo::claim(&pool, None).await.unwrap().is_none());
}

#[sqlx::test]
async fn claim_filters_by_kind(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    let video = JobRepo::submit(&pool, owner, &submit_input("video_generation"))
        .await
        .unwrap();

    let claimed = JobRepo::claim(&pool, Some(&[JobKind::VideoGeneration]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, video.id);

    // Only the image job is left; a video-only claimant finds nothing.
    assert!(JobRepo::claim(&pool, Some(&[JobKind::VideoGeneration]))
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test]
async fn at_most_one_claimant_wins_a_single_job(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();

    let (a, b, c, d, e) = tokio::join!(
        JobRepo::claim(&pool, None),
        JobRepo::claim(&pool, None),
        JobRepo::claim(&pool, None),
        JobRepo::claim(&pool, None),
        JobRepo::claim(&pool, None),
    );

    let winners = [a, b, c, d, e]
        .into_iter()
        .filter(|r| r.as_ref().unwrap().is_some())
        .count();
    assert_eq!(winners, 1);
}

// ---------------------------------------------------------------------------
// Completion and failure
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn complete_stores_result_and_is_terminal(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    let result = serde_json::json!({"asset_path": "renders/42.png"});
    assert!(JobRepo::complete(&pool, job.id, &result).await.unwrap());

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Completed.id());
    assert_eq!(row.result, Some(result.clone()));
    assert!(row.completed_at.is_some());

    // A second report is a no-op and does not clobber the stored result.
    let other = serde_json::json!({"asset_path": "renders/43.png"});
    assert!(!JobRepo::complete(&pool, job.id, &other).await.unwrap());
    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.result, Some(result));
}

#[sqlx::test]
async fn fail_with_retry_requeues_immediately(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    let requeued = JobRepo::fail(&pool, job.id, "provider timeout", true)
        .await
        .unwrap();
    assert!(requeued);

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Pending.id());
    assert_eq!(row.error_message.as_deref(), Some("provider timeout"));
    assert!(row.started_at.is_none());
    assert!(row.completed_at.is_none());

    // Immediately claimable again.
    let reclaimed = JobRepo::claim(&pool, None).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, job.id);
    assert_eq!(reclaimed.attempts, 2);
}

#[sqlx::test]
async fn fail_without_retry_is_terminal(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    let requeued = JobRepo::fail(&pool, job.id, "malformed payload", false)
        .await
        .unwrap();
    assert!(!requeued);

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Failed.id());
    assert!(row.completed_at.is_some());
    assert!(JobRepo::claim(&pool, None).await.unwrap().is_none());
}

#[sqlx::test]
async fn retry_exhaustion_lands_on_failed(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let mut input = submit_input("image_generation");
    input.max_attempts = Some(2);
    let job = JobRepo::submit(&pool, owner, &input).await.unwrap();

    JobRepo::claim(&pool, None).await.unwrap().unwrap();
    assert!(JobRepo::fail(&pool, job.id, "flaky", true).await.unwrap());

    JobRepo::claim(&pool, None).await.unwrap().unwrap();
    // Attempt cap reached: the retry request downgrades to terminal failure.
    assert!(!JobRepo::fail(&pool, job.id, "flaky again", true).await.unwrap());

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Failed.id());
    assert_eq!(row.attempts, 2);
    assert!(JobRepo::claim(&pool, None).await.unwrap().is_none());
}

#[sqlx::test]
async fn fail_with_backoff_delays_the_retry(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    let requeued =
        JobRepo::fail_with_backoff(&pool, job.id, "provider overloaded", Duration::from_secs(60))
            .await
            .unwrap();
    assert!(requeued);

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Pending.id());
    assert!(row.scheduled_for > Utc::now());

    // Not claimable until the delay elapses.
    assert!(JobRepo::claim(&pool, None).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn cancel_pending_job(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();

    assert!(JobRepo::cancel(&pool, job.id).await.unwrap());

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Cancelled.id());
    assert!(row.completed_at.is_some());
    assert!(JobRepo::claim(&pool, None).await.unwrap().is_none());
}

#[sqlx::test]
async fn cancel_processing_job(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    assert!(JobRepo::cancel(&pool, job.id).await.unwrap());

    // The worker's late completion report must not resurrect the job.
    let result = serde_json::json!({"asset_path": "renders/late.png"});
    assert!(!JobRepo::complete(&pool, job.id, &result).await.unwrap());
    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Cancelled.id());
}

#[sqlx::test]
async fn cancel_completed_job_is_a_no_op(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();
    JobRepo::complete(&pool, job.id, &serde_json::json!({}))
        .await
        .unwrap();
    let before = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();

    assert!(!JobRepo::cancel(&pool, job.id).await.unwrap());

    let after = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(after.status_id, before.status_id);
    assert_eq!(after.completed_at, before.completed_at);
}

// ---------------------------------------------------------------------------
// Reaping stuck jobs
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn requeue_stuck_returns_job_to_queue(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("video_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    sqlx::query("UPDATE jobs SET started_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(job.id)
        .execute(&pool)
        .await
        .unwrap();

    let (requeued, failed) = JobRepo::requeue_stuck(&pool, Duration::from_secs(900))
        .await
        .unwrap();
    assert_eq!((requeued, failed), (1, 0));

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Pending.id());
    assert!(row.started_at.is_none());
    assert_eq!(row.attempts, 1);
}

#[sqlx::test]
async fn requeue_stuck_fails_exhausted_jobs(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let mut input = submit_input("video_generation");
    input.max_attempts = Some(1);
    let job = JobRepo::submit(&pool, owner, &input).await.unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    sqlx::query("UPDATE jobs SET started_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(job.id)
        .execute(&pool)
        .await
        .unwrap();

    let (requeued, failed) = JobRepo::requeue_stuck(&pool, Duration::from_secs(900))
        .await
        .unwrap();
    assert_eq!((requeued, failed), (0, 1));

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Failed.id());
    assert!(row.completed_at.is_some());
}

#[sqlx::test]
async fn requeue_stuck_leaves_live_jobs_alone(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;
    let job = JobRepo::submit(&pool, owner, &submit_input("video_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();

    let (requeued, failed) = JobRepo::requeue_stuck(&pool, Duration::from_secs(900))
        .await
        .unwrap();
    assert_eq!((requeued, failed), (0, 0));

    let row = JobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, JobStatus::Processing.id());
}

// ---------------------------------------------------------------------------
// Retention cleanup
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn cleanup_removes_only_old_terminal_jobs(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    // Old completed job: should be removed.
    let old_done = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();
    JobRepo::complete(&pool, old_done.id, &serde_json::json!({}))
        .await
        .unwrap();
    sqlx::query("UPDATE jobs SET completed_at = NOW() - INTERVAL '40 days' WHERE id = $1")
        .bind(old_done.id)
        .execute(&pool)
        .await
        .unwrap();

    // Recent completed job: inside the retention window.
    let recent_done = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::claim(&pool, None).await.unwrap().unwrap();
    JobRepo::complete(&pool, recent_done.id, &serde_json::json!({}))
        .await
        .unwrap();

    // Ancient pending job: never eligible for cleanup.
    let stale_pending = JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    sqlx::query("UPDATE jobs SET created_at = NOW() - INTERVAL '90 days' WHERE id = $1")
        .bind(stale_pending.id)
        .execute(&pool)
        .await
        .unwrap();

    let deleted = JobRepo::cleanup(&pool, 30).await.unwrap();
    assert_eq!(deleted, 1);

    assert!(JobRepo::find_by_id(&pool, old_done.id).await.unwrap().is_none());
    assert!(JobRepo::find_by_id(&pool, recent_done.id).await.unwrap().is_some());
    assert!(JobRepo::find_by_id(&pool, stale_pending.id).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Stats and listing
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn stats_counts_by_status_and_active_kind(pool: PgPool) {
    let owner = seed_user(&pool, "a@example.com").await;

    JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::submit(&pool, owner, &submit_input("image_generation"))
        .await
        .unwrap();
    JobRepo::submit(&pool, owner, &submit_input("video_generation"))
        .await
        .unwrap();
    // Move the video job (highest insertion order, but only one of its
    // kind) into processing.
    JobRepo::claim(&pool, Some(&[JobKind::VideoGeneration]))
        .await
        .unwrap()
        .unwrap();

    let stats = JobRepo::stats(&pool).await.unwrap();

    let pending = stats
        .by_status_24h
        .iter()
        .find(|c| c.status_id == JobStatus::Pending.id())
        .map(|c| c.count);
    let processing = stats
        .by_status_24h
        .iter()
        .find(|c| c.status_id == JobStatus::Processing.id())
        .map(|c| c.count);
    assert_eq!(pending, Some(2));
    assert_eq!(processing, Some(1));

    let images = stats
        .active_by_type
        .iter()
        .find(|c| c.job_type == "image_generation")
        .map(|c| c.count);
    let videos = stats
        .active_by_type
        .iter()
        .find(|c| c.job_type == "video_generation")
        .map(|c| c.count);
    assert_eq!(images, Some(2));
    assert_eq!(videos, Some(1));
}

#[sqlx::test]
async fn list_by_owner_filters_and_paginates(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;

    for _ in 0..3 {
        JobRepo::submit(&pool, alice, &submit_input("image_generation"))
            .await
            .unwrap();
    }
    JobRepo::submit(&pool, bob, &submit_input("image_generation"))
        .await
        .unwrap();

    let all = JobRepo::list_by_owner(&pool, alice, &JobListQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|j| j.owner_id == alice));

    let page = JobRepo::list_by_owner(
        &pool,
        alice,
        &JobListQuery {
            status_id: None,
            limit: Some(2),
            offset: Some(2),
        },
    )
    .await
    .unwrap();
    assert_eq!(page.len(), 1);

    // Claim one job; the pending filter should shrink accordingly.
    JobRepo::claim(&pool, None).await.unwrap().unwrap();
    let pending = JobRepo::list_by_owner(
        &pool,
        alice,
        &JobListQuery {
            status_id: Some(JobStatus::Pending.id()),
            limit: None,
            offset: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(pending.len(), 2);
}
