use std::time::Duration;

/// Worker configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// How often the runner polls for claimable jobs (default: 1000 ms).
    pub poll_interval: Duration,
    /// How long a job may sit in processing before the reaper returns
    /// it to the queue (default: 900 s).
    pub stuck_timeout: Duration,
    /// How often the reaper checks for stuck jobs (default: 60 s).
    pub reaper_interval: Duration,
    /// Terminal jobs older than this many days are deleted by the
    /// retention sweep (default: 30).
    pub retention_days: i32,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default  |
    /// |------------------------------|----------|
    /// | `DATABASE_URL`               | required |
    /// | `WORKER_POLL_INTERVAL_MS`    | `1000`   |
    /// | `WORKER_STUCK_TIMEOUT_SECS`  | `900`    |
    /// | `WORKER_REAPER_INTERVAL_SECS`| `60`     |
    /// | `JOB_RETENTION_DAYS`         | `30`     |
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let stuck_timeout_secs: u64 = std::env::var("WORKER_STUCK_TIMEOUT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("WORKER_STUCK_TIMEOUT_SECS must be a valid u64");

        let reaper_interval_secs: u64 = std::env::var("WORKER_REAPER_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("WORKER_REAPER_INTERVAL_SECS must be a valid u64");

        let retention_days: i32 = std::env::var("JOB_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("JOB_RETENTION_DAYS must be a valid i32");

        Self {
            database_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            stuck_timeout: Duration::from_secs(stuck_timeout_secs),
            reaper_interval: Duration::from_secs(reaper_interval_secs),
            retention_days,
        }
    }
}
