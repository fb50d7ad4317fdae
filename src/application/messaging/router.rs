//! Command router - Matches inbound messages to registered commands

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::application::errors::BotError;
use crate::domain::entities::command::{equals, find_command, most_specific, Resolution};
use crate::domain::entities::{Arguments, Command, Event, MessageEvent, ReactionEvent};
use crate::domain::traits::Bot;
use super::context::{handler, Context, Handler, HandlerResult, ObjectStore};
use super::middleware::Middleware;

/// Receives reaction events delivered to the router
#[async_trait]
pub trait ReactionListener: Send + Sync {
    async fn on_reaction(&self, router: &Arc<Router>, bot: Arc<dyn Bot>, event: &ReactionEvent) -> Result<(), BotError>;
}

/// Why a message was not dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Author is an automated account
    Automated,
    /// No prefix matched
    NoPrefix,
    /// Nothing followed the prefix
    Empty,
    /// No root command matched
    NoCommand,
}

/// Result of handling one message
#[derive(Debug)]
pub enum Dispatch {
    Ignored(Discard),
    Ping,
    Resolved(Resolution),
}

impl Dispatch {
    /// Name of the resolved command, if any
    pub fn command_name(&self) -> Option<&str> {
        match self {
            Dispatch::Resolved(resolution) => Some(&resolution.command.name),
            _ => None,
        }
    }
}

/// Frozen command registry shared across concurrent dispatches
pub struct Router {
    prefixes: Vec<String>,
    ignore_prefix_case: bool,
    bots_allowed: bool,
    commands: Vec<Arc<Command>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    ping_handler: Option<Handler>,
    storages: HashMap<String, Arc<ObjectStore>>,
    reaction_listeners: Vec<Arc<dyn ReactionListener>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    /// Root command `name` refers to
    pub fn command(&self, name: &str) -> Option<&Arc<Command>> {
        find_command(&self.commands, name)
    }

    /// Named storage registered at build time
    pub fn storage(&self, name: &str) -> Option<&Arc<ObjectStore>> {
        self.storages.get(name)
    }

    /// Handle one inbound message
    pub async fn handle(self: &Arc<Self>, bot: Arc<dyn Bot>, event: MessageEvent) -> Dispatch {
        if event.author.is_bot && !self.bots_allowed {
            return Dispatch::Ignored(Discard::Automated);
        }

        let event = Arc::new(event);

        if let Some(ping_handler) = &self.ping_handler {
            if bot.bot_info().is_mentioned_alone(&event.content) {
                tracing::debug!("[{}] Pinged by {}", event.channel_id, event.author.id);
                let ctx = Context::new(self.clone(), bot, event.clone(), Arguments::empty());
                if let Err(e) = ping_handler(ctx).await {
                    tracing::warn!("[{}] Ping handler failed: {}", event.channel_id, e);
                }
                return Dispatch::Ping;
            }
        }

        let Some(content) = self.strip_prefix(&event.content) else {
            return Dispatch::Ignored(Discard::NoPrefix);
        };

        let content = content.trim();
        if content.is_empty() {
            return Dispatch::Ignored(Discard::Empty);
        }

        let Some((command, rest)) = self.match_root(content) else {
            tracing::debug!("[{}] No command matches {:?}", event.channel_id, content);
            return Dispatch::Ignored(Discard::NoCommand);
        };

        let command = command.clone();
        let arguments = Arguments::parse(rest.trim());
        let mut ctx = Context::new(self.clone(), bot, event.clone(), arguments);
        ctx.command = Some(command.clone());

        Dispatch::Resolved(command.trigger(ctx).await)
    }

    /// Forward a reaction event to every registered listener
    pub async fn handle_reaction(self: &Arc<Self>, bot: Arc<dyn Bot>, event: ReactionEvent) {
        for listener in &self.reaction_listeners {
            if let Err(e) = listener.on_reaction(self, bot.clone(), &event).await {
                tracing::warn!("[{}] Reaction listener failed: {}", event.channel_id, e);
            }
        }
    }

    /// Handle a message in its own task so a panicking handler stays isolated
    pub fn spawn_handle(self: &Arc<Self>, bot: Arc<dyn Bot>, event: MessageEvent) -> JoinHandle<Dispatch> {
        let router = self.clone();
        tokio::spawn(async move { router.handle(bot, event).await })
    }

    /// Dispatch events until the channel closes, one task per event
    pub async fn listen(self: Arc<Self>, bot: Arc<dyn Bot>, mut events: mpsc::Receiver<Event>) {
        let mut tasks = JoinSet::new();
        tracing::info!("Router listening with {} commands", self.commands.len());

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    let router = self.clone();
                    let bot = bot.clone();
                    tasks.spawn(async move {
                        match event {
                            Event::Message(message) => {
                                router.handle(bot, message).await;
                            }
                            Event::Reaction(reaction) => router.handle_reaction(bot, reaction).await,
                        }
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_join(joined),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        tracing::info!("Router stopped listening");
    }

    /// Strip the first declared prefix that starts `content`
    fn strip_prefix<'a>(&self, content: &'a str) -> Option<&'a str> {
        self.prefixes.iter().find_map(|prefix| {
            let head = content.get(..prefix.len())?;
            equals(head, prefix, self.ignore_prefix_case).then(|| &content[prefix.len()..])
        })
    }

    /// Most specific root command starting `content` as a whole word
    fn match_root<'a>(&self, content: &'a str) -> Option<(&Arc<Command>, &'a str)> {
        most_specific(&self.commands).into_iter().find_map(|(id, command)| {
            let head = content.get(..id.len())?;
            if !equals(head, id, command.ignore_case) {
                return None;
            }
            let rest = &content[id.len()..];
            let bounded = rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\n');
            bounded.then_some((command, rest))
        })
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!("Dispatch panicked: {}", e);
        } else {
            tracing::warn!("Dispatch task cancelled: {}", e);
        }
    }
}

/// Collects router configuration before it is frozen
#[derive(Default)]
pub struct RouterBuilder {
    prefixes: Vec<String>,
    ignore_prefix_case: bool,
    bots_allowed: bool,
    commands: Vec<Arc<Command>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    ping_handler: Option<Handler>,
    storages: HashMap<String, Arc<ObjectStore>>,
    reaction_listeners: Vec<Arc<dyn ReactionListener>>,
}

impl RouterBuilder {
    /// Add a prefix; prefixes are tried in the order they are added
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn ignore_prefix_case(mut self, ignore: bool) -> Self {
        self.ignore_prefix_case = ignore;
        self
    }

    pub fn bots_allowed(mut self, allowed: bool) -> Self {
        self.bots_allowed = allowed;
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(Arc::new(command));
        self
    }

    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn ping_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.ping_handler = Some(handler(f));
        self
    }

    /// Register a named storage if it does not exist yet
    pub fn storage(mut self, name: impl Into<String>) -> Self {
        self.storages.entry(name.into()).or_default();
        self
    }

    pub fn reaction_listener<L: ReactionListener + 'static>(mut self, listener: L) -> Self {
        self.reaction_listeners.push(Arc::new(listener));
        self
    }

    pub fn build(self) -> Arc<Router> {
        Arc::new(Router {
            prefixes: self.prefixes,
            ignore_prefix_case: self.ignore_prefix_case,
            bots_allowed: self.bots_allowed,
            commands: self.commands,
            middlewares: self.middlewares,
            ping_handler: self.ping_handler,
            storages: self.storages,
            reaction_listeners: self.reaction_listeners,
        })
    }
}
