//! Middleware system for command execution pipeline

use std::sync::Arc;
use std::time::Instant;

use super::context::{Context, Handler, HandlerFuture};

/// Flag matching every command
pub const ANY_FLAG: &str = "*";

/// Middleware trait - wraps the next handler in the chain.
///
/// A middleware aborts execution by not calling the wrapped handler.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: Handler) -> Handler;
}

impl<F> Middleware for F
where
    F: Fn(Handler) -> Handler + Send + Sync,
{
    fn wrap(&self, next: Handler) -> Handler {
        self(next)
    }
}

/// Wrap `handler` in `middlewares`; the first registered runs outermost
pub fn compose(handler: Handler, middlewares: &[Arc<dyn Middleware>]) -> Handler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware.wrap(next))
}

/// Middleware chain builder
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
    }
}

type Check = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Runs a check only for commands carrying `flag` and stops the chain when
/// it fails. `ANY_FLAG` applies the check to every command.
pub struct FlagMiddleware {
    flag: String,
    check: Check,
}

impl FlagMiddleware {
    pub fn new<F>(flag: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self {
            flag: flag.into(),
            check: Arc::new(check),
        }
    }

    fn applies(flag: &str, ctx: &Context) -> bool {
        flag == ANY_FLAG
            || ctx.command
                .as_ref()
                .is_some_and(|command| command.flags.iter().any(|f| f == flag))
    }
}

impl Middleware for FlagMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        let flag = self.flag.clone();
        let check = self.check.clone();

        Arc::new(move |ctx: Context| -> HandlerFuture {
            if Self::applies(&flag, &ctx) && !check(&ctx) {
                tracing::debug!("[{}] Stopped by '{}' middleware", ctx.channel_id(), flag);
                return Box::pin(async { Ok(()) });
            }
            next(ctx)
        })
    }
}

/// Logging middleware for debugging
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn wrap(&self, next: Handler) -> Handler {
        Arc::new(move |ctx: Context| -> HandlerFuture {
            let next = next.clone();
            Box::pin(async move {
                let channel = ctx.channel_id().to_string();
                let command = ctx.command_name().unwrap_or("-").to_string();
                tracing::debug!("[{}] {} {:?}", channel, command, ctx.arguments.raw());

                let started = Instant::now();
                let result = next(ctx).await;

                match &result {
                    Ok(()) => tracing::debug!("[{}] {} done in {:?}", channel, command, started.elapsed()),
                    Err(e) => tracing::debug!("[{}] {} failed after {:?}: {}", channel, command, started.elapsed(), e),
                }
                result
            })
        })
    }
}
