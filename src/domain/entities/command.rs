use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::application::errors::BotError;
use crate::application::messaging::context::{handler, Context, Handler, HandlerResult};
use crate::application::messaging::middleware::compose;
use crate::application::messaging::rate_limiter::RateLimiter;

/// Represents a bot command or sub-command
pub struct Command {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub usage: String,
    pub example: String,
    pub flags: Vec<String>,
    pub ignore_case: bool,
    pub sub_commands: Vec<Arc<Command>>,
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,
    pub handler: Option<Handler>,
}

/// How a resolved command finished
#[derive(Debug)]
pub enum Outcome {
    /// Handler ran to completion
    Executed,
    /// Handler returned an error
    Failed(BotError),
    /// Rate limiter refused the execution
    RateLimited,
    /// Resolved command has no handler
    NoHandler,
}

/// Terminal command reached by resolution and its outcome
pub struct Resolution {
    pub command: Arc<Command>,
    pub outcome: Outcome,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("command", &self.command.name)
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            usage: String::new(),
            example: String::new(),
            flags: Vec::new(),
            ignore_case: false,
            sub_commands: Vec::new(),
            rate_limiter: None,
            handler: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_sub_command(mut self, command: Command) -> Self {
        self.sub_commands.push(Arc::new(command));
        self
    }

    pub fn with_rate_limiter<R: RateLimiter + 'static>(mut self, rate_limiter: R) -> Self {
        self.rate_limiter = Some(Arc::new(rate_limiter));
        self
    }

    pub fn with_shared_rate_limiter(mut self, rate_limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(handler(f));
        self
    }

    /// Name and aliases, longest first; equal lengths keep declaration order
    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .collect();
        identifiers.sort_by(|a, b| b.len().cmp(&a.len()));
        identifiers
    }

    /// Whether `input` equals the name or an alias under this command's case policy
    pub fn matches(&self, input: &str) -> bool {
        self.identifiers().iter().any(|id| equals(id, input, self.ignore_case))
    }

    /// Find the sub-command `input` refers to. Candidates across all children
    /// are compared longest identifier first, then in declaration order.
    pub fn sub_command(&self, input: &str) -> Option<&Arc<Command>> {
        find_command(&self.sub_commands, input)
    }

    /// Resolve `ctx` against this command: descend into a matching sub-command,
    /// otherwise run this command through its rate limiter and the router's
    /// middlewares. Once a sub-command is chosen there is no fallback.
    pub fn trigger(self: Arc<Self>, ctx: Context) -> Pin<Box<dyn Future<Output = Resolution> + Send>> {
        Box::pin(async move {
            let child = ctx.arguments
                .tokens()
                .first()
                .and_then(|first| self.sub_command(first.raw()))
                .cloned();

            match child {
                Some(child) => {
                    tracing::debug!("[{}] {} -> {}", ctx.channel_id(), self.name, child.name);
                    let ctx = ctx.descend(child.clone(), ctx.arguments.shift());
                    child.trigger(ctx).await
                }
                None => self.execute(ctx).await,
            }
        })
    }

    async fn execute(self: Arc<Self>, ctx: Context) -> Resolution {
        let Some(handler) = self.handler.clone() else {
            tracing::debug!("[{}] Command {} has no handler", ctx.channel_id(), self.name);
            return Resolution { command: self, outcome: Outcome::NoHandler };
        };

        let admitted = match &self.rate_limiter {
            Some(rate_limiter) => rate_limiter.notify_execution(&ctx).await,
            None => true,
        };
        if !admitted {
            return Resolution { command: self, outcome: Outcome::RateLimited };
        }

        let channel_id = ctx.channel_id().to_string();
        let chain = compose(handler, ctx.router.middlewares());

        tracing::info!("[{}] Executing {} by {}", channel_id, self.name, ctx.author_id());
        let outcome = match chain(ctx).await {
            Ok(()) => Outcome::Executed,
            Err(e) => {
                tracing::warn!("[{}] Command {} failed: {}", channel_id, self.name, e);
                Outcome::Failed(e)
            }
        };

        Resolution { command: self, outcome }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("flags", &self.flags)
            .field("sub_commands", &self.sub_commands)
            .finish()
    }
}

/// Every identifier of `commands` paired with its command, longest first
pub(crate) fn most_specific(commands: &[Arc<Command>]) -> Vec<(&str, &Arc<Command>)> {
    let mut candidates: Vec<(&str, &Arc<Command>)> = commands
        .iter()
        .flat_map(|command| command.identifiers().into_iter().map(move |id| (id, command)))
        .collect();
    candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    candidates
}

/// Command among `commands` whose identifier equals `input`, most specific first
pub(crate) fn find_command<'a>(commands: &'a [Arc<Command>], input: &str) -> Option<&'a Arc<Command>> {
    most_specific(commands)
        .into_iter()
        .find(|(id, command)| equals(id, input, command.ignore_case))
        .map(|(_, command)| command)
}

pub(crate) fn equals(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}
