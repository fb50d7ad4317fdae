//! Message handling - Command resolution and dispatch

pub mod context;
pub mod middleware;
pub mod rate_limiter;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{handler, Context, Handler, HandlerFuture, HandlerResult, ObjectStore};
pub use middleware::{compose, FlagMiddleware, LoggingMiddleware, Middleware, MiddlewareChain};
pub use rate_limiter::{Admission, DefaultRateLimiter, RateLimiter, NEXT_EXECUTION_KEY};
pub use router::{Discard, Dispatch, ReactionListener, Router, RouterBuilder};
