//! Per-identity cooldown gate for command executions

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::context::{Context, Handler};

/// Context store key holding the next allowed execution time on rejection
pub const NEXT_EXECUTION_KEY: &str = "next_execution";

/// Rate limiter consulted before a command executes
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Notify the limiter about an execution and return whether it may proceed
    async fn notify_execution(&self, ctx: &Context) -> bool;
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { next_allowed: DateTime<Utc> },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

struct Executions {
    expiries: HashMap<String, DateTime<Utc>>,
    last_sweep: DateTime<Utc>,
}

impl Executions {
    fn sweep(&mut self, now: DateTime<Utc>) {
        self.expiries.retain(|_, expires| *expires > now);
        self.last_sweep = now;
    }
}

/// Allows one execution per identity key every `cooldown`
pub struct DefaultRateLimiter {
    cooldown: chrono::Duration,
    cleanup_interval: chrono::Duration,
    on_rate_limited: Option<Handler>,
    executions: Arc<Mutex<Executions>>,
}

impl DefaultRateLimiter {
    /// Create a new rate limiter. When called inside a tokio runtime, expired
    /// entries are also purged by a background task every `cleanup_interval`.
    pub fn new(cooldown: Duration, cleanup_interval: Duration, on_rate_limited: Option<Handler>) -> Self {
        let limiter = Self {
            cooldown: to_chrono(cooldown),
            cleanup_interval: to_chrono(cleanup_interval),
            on_rate_limited,
            executions: Arc::new(Mutex::new(Executions {
                expiries: HashMap::new(),
                last_sweep: Utc::now(),
            })),
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(sweep_periodically(Arc::downgrade(&limiter.executions), cleanup_interval));
        }

        limiter
    }

    /// Check and record an execution for `key` at the current time
    pub fn admit(&self, key: &str) -> Admission {
        self.admit_at(key, Utc::now())
    }

    /// Check and record an execution for `key` at `now`
    pub fn admit_at(&self, key: &str, now: DateTime<Utc>) -> Admission {
        let mut executions = self.lock();

        if now - executions.last_sweep >= self.cleanup_interval {
            executions.sweep(now);
        }

        if let Some(expires) = executions.expiries.get(key) {
            if *expires > now {
                return Admission::Rejected { next_allowed: *expires };
            }
        }

        let expires = now.checked_add_signed(self.cooldown).unwrap_or(DateTime::<Utc>::MAX_UTC);
        executions.expiries.insert(key.to_string(), expires);
        Admission::Admitted
    }

    /// Remove expired entries
    pub fn sweep(&self) {
        self.lock().sweep(Utc::now());
    }

    /// Number of tracked identity keys, expired or not
    pub fn tracked(&self) -> usize {
        self.lock().expiries.len()
    }

    fn lock(&self) -> MutexGuard<'_, Executions> {
        self.executions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RateLimiter for DefaultRateLimiter {
    async fn notify_execution(&self, ctx: &Context) -> bool {
        let Admission::Rejected { next_allowed } = self.admit(ctx.author_id()) else {
            return true;
        };

        tracing::debug!(
            "[{}] Rate limited {} until {}",
            ctx.channel_id(),
            ctx.author_id(),
            next_allowed
        );

        ctx.objects.set(NEXT_EXECUTION_KEY, next_allowed);
        if let Some(on_rate_limited) = &self.on_rate_limited {
            if let Err(e) = on_rate_limited(ctx.clone()).await {
                tracing::warn!("[{}] Rate limit handler failed: {}", ctx.channel_id(), e);
            }
        }
        false
    }
}

async fn sweep_periodically(executions: Weak<Mutex<Executions>>, period: Duration) {
    if period.is_zero() {
        return;
    }
    let mut interval = tokio::time::interval(period);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(executions) = executions.upgrade() else {
            break;
        };
        executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sweep(Utc::now());
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
