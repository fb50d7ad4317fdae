//! Execution context threaded through middleware and handlers

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use crate::application::errors::{BotError, StoreError};
use crate::domain::entities::{Arguments, Command, Embed, MessageEvent};
use crate::domain::traits::Bot;
use super::router::Router;

/// Handler result
pub type HandlerResult = Result<(), BotError>;

/// Boxed future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Handler function type
pub type Handler = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure into a `Handler`
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: Context| -> HandlerFuture { Box::pin(f(ctx)) })
}

type Object = Arc<dyn Any + Send + Sync>;

/// Thread-safe key/value store with typed access
#[derive(Default)]
pub struct ObjectStore {
    objects: RwLock<HashMap<String, Object>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
    }

    /// Get a value, distinguishing a missing key from a value of another type
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, StoreError> {
        let object = self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Missing(key.to_string()))?;

        object.downcast::<T>().map_err(|_| StoreError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
    }

    pub fn get_opt<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.get(key).ok()
    }

    /// Replace the value under `key` in one critical section. `f` sees the
    /// current value (`None` when missing or of another type); returning
    /// `None` removes the key.
    pub fn update<T, F>(&self, key: &str, f: F) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce(Option<&T>) -> Option<T>,
    {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        let current = objects.get(key).and_then(|object| object.downcast_ref::<T>());

        match f(current) {
            Some(value) => {
                let value = Arc::new(value);
                objects.insert(key.to_string(), value.clone());
                Some(value)
            }
            None => {
                objects.remove(key);
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn delete(&self, key: &str) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ObjectStore")
            .field("keys", &objects.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Context passed through middleware chain
///
/// Sub-command contexts share the store, bot and router of their parent and
/// only differ in `arguments` and `command`.
#[derive(Clone)]
pub struct Context {
    pub event: Arc<MessageEvent>,
    pub bot: Arc<dyn Bot>,
    pub arguments: Arguments,
    pub objects: Arc<ObjectStore>,
    pub router: Arc<Router>,
    pub command: Option<Arc<Command>>,
}

impl Context {
    pub fn new(router: Arc<Router>, bot: Arc<dyn Bot>, event: Arc<MessageEvent>, arguments: Arguments) -> Self {
        Self {
            event,
            bot,
            arguments,
            objects: Arc::new(ObjectStore::new()),
            router,
            command: None,
        }
    }

    /// Context for a sub-command, sharing this context's store
    pub fn descend(&self, command: Arc<Command>, arguments: Arguments) -> Self {
        Self {
            arguments,
            command: Some(command),
            ..self.clone()
        }
    }

    pub fn author_id(&self) -> &str {
        &self.event.author.id
    }

    pub fn channel_id(&self) -> &str {
        &self.event.channel_id
    }

    /// Name of the command being executed, if any
    pub fn command_name(&self) -> Option<&str> {
        self.command.as_deref().map(|c| c.name.as_str())
    }

    pub async fn respond_text(&self, text: &str) -> Result<String, BotError> {
        self.bot.send_message(self.channel_id(), text).await
    }

    pub async fn respond_embed(&self, embed: &Embed) -> Result<String, BotError> {
        self.bot.send_embed(self.channel_id(), embed).await
    }

    pub async fn respond_text_embed(&self, text: &str, embed: &Embed) -> Result<String, BotError> {
        self.bot.send_complex(self.channel_id(), text, embed).await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("channel_id", &self.event.channel_id)
            .field("author_id", &self.event.author.id)
            .field("arguments", &self.arguments)
            .field("command", &self.command_name())
            .finish()
    }
}
