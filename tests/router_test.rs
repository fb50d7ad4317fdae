//! Router Integration Tests
//! Run with: cargo test --test router_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use chat_router::application::messaging::{
    handler, DefaultRateLimiter, Discard, Dispatch, FlagMiddleware, Handler, HandlerFuture, Router,
    NEXT_EXECUTION_KEY,
};
use chat_router::application::services::help::{page_key, CLOSE, HELP_STORAGE, NEXT_PAGE, PREVIOUS_PAGE};
use chat_router::domain::entities::command::Outcome;
use chat_router::domain::entities::{Command, Embed, Event, MessageEvent, ReactionEvent, User};
use chat_router::domain::traits::{Bot, BotInfo};
use chat_router::{BotError, Context};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Everything the router asked the platform to do
#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Embed { id: String, title: String },
    Edit { id: String, title: String },
    Delete(String),
    React { id: String, emoji: String },
    Unreact { id: String, emoji: String, user: String },
}

#[derive(Default)]
struct RecordingBot {
    sent: Mutex<Vec<Sent>>,
    ids: AtomicUsize,
    edit_delay: Duration,
}

impl RecordingBot {
    /// Bot whose embed edits take `delay` to complete
    fn with_edit_delay(delay: Duration) -> Self {
        Self { edit_delay: delay, ..Self::default() }
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    fn next_id(&self) -> String {
        format!("msg-{}", self.ids.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    fn bot_info(&self) -> BotInfo {
        BotInfo {
            id: "0".to_string(),
            name: "recorder".to_string(),
            username: "recorder".to_string(),
        }
    }

    async fn send_message(&self, _channel_id: &str, text: &str) -> Result<String, BotError> {
        self.record(Sent::Text(text.to_string()));
        Ok(self.next_id())
    }

    async fn send_embed(&self, _channel_id: &str, embed: &Embed) -> Result<String, BotError> {
        let id = self.next_id();
        self.record(Sent::Embed { id: id.clone(), title: embed.title.clone() });
        Ok(id)
    }

    async fn send_complex(&self, _channel_id: &str, text: &str, embed: &Embed) -> Result<String, BotError> {
        self.record(Sent::Text(text.to_string()));
        self.send_embed("", embed).await
    }

    async fn edit_embed(&self, _channel_id: &str, message_id: &str, embed: &Embed) -> Result<(), BotError> {
        if !self.edit_delay.is_zero() {
            tokio::time::sleep(self.edit_delay).await;
        }
        self.record(Sent::Edit { id: message_id.to_string(), title: embed.title.clone() });
        Ok(())
    }

    async fn delete_message(&self, _channel_id: &str, message_id: &str) -> Result<(), BotError> {
        self.record(Sent::Delete(message_id.to_string()));
        Ok(())
    }

    async fn add_reaction(&self, _channel_id: &str, message_id: &str, emoji: &str) -> Result<(), BotError> {
        self.record(Sent::React { id: message_id.to_string(), emoji: emoji.to_string() });
        Ok(())
    }

    async fn remove_reaction(&self, _channel_id: &str, message_id: &str, emoji: &str, user_id: &str) -> Result<(), BotError> {
        self.record(Sent::Unreact {
            id: message_id.to_string(),
            emoji: emoji.to_string(),
            user: user_id.to_string(),
        });
        Ok(())
    }
}

type Seen = Arc<Mutex<Vec<String>>>;

/// Handler recording `label` followed by the raw arguments it received
fn recording(seen: &Seen, label: &str) -> Handler {
    let seen = seen.clone();
    let label = label.to_string();
    handler(move |ctx: Context| {
        let seen = seen.clone();
        let label = label.clone();
        async move {
            seen.lock().unwrap().push(format!("{}:{}", label, ctx.arguments.raw()));
            Ok(())
        }
    })
}

fn command(name: &str, seen: &Seen) -> Command {
    labelled(name, name, seen)
}

fn labelled(name: &str, label: &str, seen: &Seen) -> Command {
    let handle = recording(seen, label);
    Command::new(name).with_handler(move |ctx: Context| handle(ctx))
}

fn message(content: &str) -> MessageEvent {
    MessageEvent::new("channel", User::new("user"), content)
}

fn bots() -> (Arc<RecordingBot>, Arc<dyn Bot>) {
    let recorder = Arc::new(RecordingBot::default());
    let bot: Arc<dyn Bot> = recorder.clone();
    (recorder, bot)
}

#[tokio::test]
async fn test_alias_and_middleware_object() {
    ensure_init();

    let values: Seen = Arc::default();
    let captured = values.clone();

    let router = Router::builder()
        .prefix("!")
        .middleware(|next: Handler| -> Handler {
            Arc::new(move |ctx: Context| -> HandlerFuture {
                ctx.objects.set("myObject", 69i64);
                next(ctx)
            })
        })
        .command(Command::new("obj").with_alias("object").with_handler(move |ctx: Context| {
            let captured = captured.clone();
            async move {
                let object = ctx.objects.get::<i64>("myObject")?;
                let args: Vec<String> = ctx.arguments.tokens().iter().map(|a| a.raw().to_string()).collect();
                captured
                    .lock()
                    .unwrap()
                    .push(format!("{} {} {:?}", ctx.command_name().unwrap_or(""), object, args));
                Ok(())
            }
        }))
        .build();

    let (_, bot) = bots();
    let dispatch = router.handle(bot, message("!object 42")).await;

    assert_eq!(dispatch.command_name(), Some("obj"));
    assert_eq!(*values.lock().unwrap(), vec![r#"obj 69 ["42"]"#.to_string()]);
}

#[tokio::test]
async fn test_longest_identifier_wins() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefix("!")
        .command(command("he", &seen))
        .command(command("help", &seen))
        .build();
    let (_, bot) = bots();

    router.handle(bot.clone(), message("!help")).await;
    router.handle(bot.clone(), message("!he lp")).await;
    router.handle(bot.clone(), message("!helpme")).await;

    assert_eq!(*seen.lock().unwrap(), vec!["help:".to_string(), "he:lp".to_string()]);
}

#[tokio::test]
async fn test_sub_commands_resolve_recursively() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefix("!")
        .command(
            command("help", &seen).with_sub_command(
                command("sub1", &seen)
                    .ignore_case(true)
                    .with_sub_command(command("sub2", &seen)),
            ),
        )
        .build();
    let (_, bot) = bots();

    let dispatch = router.handle(bot.clone(), message(r#"!help SUB1 sub2 a "b c""#)).await;
    assert_eq!(dispatch.command_name(), Some("sub2"));

    // sub2 is case sensitive, so sub1 runs with it as an argument
    router.handle(bot.clone(), message("!help sub1 SUB2")).await;
    router.handle(bot, message("!help other")).await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            r#"sub2:a "b c""#.to_string(),
            "sub1:SUB2".to_string(),
            "help:other".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_first_declared_prefix_wins() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefixes(["!", "!!"])
        .command(command("x", &seen))
        .command(command("!x", &seen))
        .build();
    let (_, bot) = bots();

    // "!" strips first, leaving "!x" which is its own command
    router.handle(bot.clone(), message("!!x")).await;
    let dispatch = router.handle(bot, message("?x")).await;

    assert!(matches!(dispatch, Dispatch::Ignored(Discard::NoPrefix)));
    assert_eq!(*seen.lock().unwrap(), vec!["!x:".to_string()]);
}

#[tokio::test]
async fn test_ping_bypasses_commands_and_middleware() {
    ensure_init();

    let seen: Seen = Arc::default();
    let middleware_seen = seen.clone();
    let router = Router::builder()
        .prefix("<@0>")
        .middleware(move |next: Handler| -> Handler {
            let middleware_seen = middleware_seen.clone();
            Arc::new(move |ctx: Context| -> HandlerFuture {
                middleware_seen.lock().unwrap().push("middleware".to_string());
                next(ctx)
            })
        })
        .ping_handler(|ctx: Context| async move {
            ctx.respond_text("Pong!").await?;
            Ok(())
        })
        .command(command("x", &seen))
        .build();
    let (recorder, bot) = bots();

    assert!(matches!(router.handle(bot.clone(), message("<@0>")).await, Dispatch::Ping));
    assert!(matches!(router.handle(bot.clone(), message("<@!0>")).await, Dispatch::Ping));
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(recorder.texts(), vec!["Pong!", "Pong!"]);

    router.handle(bot, message("<@0> x")).await;
    assert_eq!(*seen.lock().unwrap(), vec!["middleware".to_string(), "x:".to_string()]);
}

#[tokio::test]
async fn test_automated_authors_are_dropped() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder().prefix("!").command(command("x", &seen)).build();
    let (_, bot) = bots();

    let event = MessageEvent::new("channel", User::new("other-bot").automated(), "!x");
    let dispatch = router.handle(bot, event).await;

    assert!(matches!(dispatch, Dispatch::Ignored(Discard::Automated)));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limited_execution_exposes_next_time() {
    ensure_init();

    let seen: Seen = Arc::default();
    let next_allowed: Arc<Mutex<Option<DateTime<Utc>>>> = Arc::default();
    let captured = next_allowed.clone();

    let limiter = DefaultRateLimiter::new(
        Duration::from_secs(60),
        Duration::from_secs(1),
        Some(handler(move |ctx: Context| {
            let captured = captured.clone();
            async move {
                let next = ctx.objects.get::<DateTime<Utc>>(NEXT_EXECUTION_KEY)?;
                *captured.lock().unwrap() = Some(*next);
                ctx.respond_text("slow down").await?;
                Ok(())
            }
        })),
    );

    let router = Router::builder()
        .prefix("!")
        .command(command("limited", &seen).with_rate_limiter(limiter))
        .build();
    let (recorder, bot) = bots();

    let before = Utc::now();
    let first = router.handle(bot.clone(), message("!limited")).await;
    let second = router.handle(bot.clone(), message("!limited")).await;
    let other_user = router
        .handle(bot, MessageEvent::new("channel", User::new("another"), "!limited"))
        .await;

    assert!(matches!(first, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::Executed)));
    assert!(matches!(second, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::RateLimited)));
    assert!(matches!(other_user, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::Executed)));
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(recorder.texts(), vec!["slow down"]);

    let next = (*next_allowed.lock().unwrap()).expect("rejection handler ran");
    let ahead = next - before;
    assert!(ahead > chrono::Duration::seconds(59) && ahead <= chrono::Duration::seconds(61));
}

#[tokio::test]
async fn test_flag_middleware_aborts_chain() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefix("!")
        .middleware(FlagMiddleware::new("admin", |ctx: &Context| ctx.author_id() == "root"))
        .command(command("ban", &seen).with_flag("admin"))
        .command(command("hello", &seen))
        .build();
    let (_, bot) = bots();

    router.handle(bot.clone(), message("!ban someone")).await;
    router.handle(bot.clone(), message("!hello")).await;
    router
        .handle(bot, MessageEvent::new("channel", User::new("root"), "!ban someone"))
        .await;

    assert_eq!(*seen.lock().unwrap(), vec!["hello:".to_string(), "ban:someone".to_string()]);
}

#[tokio::test]
async fn test_handler_errors_are_reported() {
    ensure_init();

    let router = Router::builder()
        .prefix("!")
        .command(Command::new("parse").with_handler(|ctx: Context| async move {
            let value = ctx.arguments.get(0).as_int()?;
            ctx.respond_text(&value.to_string()).await?;
            Ok(())
        }))
        .build();
    let (recorder, bot) = bots();

    let failed = router.handle(bot.clone(), message("!parse nope")).await;
    let executed = router.handle(bot, message("!parse 7")).await;

    assert!(matches!(failed, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::Failed(BotError::Argument(_)))));
    assert!(matches!(executed, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::Executed)));
    assert_eq!(recorder.texts(), vec!["7"]);
}

#[tokio::test]
async fn test_panicking_handler_is_isolated() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefix("!")
        .command(Command::new("crash").with_handler(|ctx: Context| async move {
            if ctx.arguments.is_empty() {
                panic!("handler crashed");
            }
            Ok(())
        }))
        .command(command("ok", &seen))
        .build();
    let (_, bot) = bots();

    let crashed = router.spawn_handle(bot.clone(), message("!crash")).await;
    assert!(crashed.unwrap_err().is_panic());

    let dispatch = router.spawn_handle(bot, message("!ok")).await.unwrap();
    assert_eq!(dispatch.command_name(), Some("ok"));
    assert_eq!(*seen.lock().unwrap(), vec!["ok:".to_string()]);
}

#[tokio::test]
async fn test_listen_survives_panics_until_channel_closes() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefix("!")
        .command(Command::new("crash").with_handler(|ctx: Context| async move {
            if ctx.arguments.is_empty() {
                panic!("handler crashed");
            }
            Ok(())
        }))
        .command(command("ok", &seen))
        .build();
    let (_, bot) = bots();

    let (tx, rx) = mpsc::channel(8);
    let listener = tokio::spawn(router.listen(bot, rx));

    tx.send(Event::Message(message("!crash"))).await.unwrap();
    tx.send(Event::Message(message("!ok 1"))).await.unwrap();
    tx.send(Event::Message(message("!ok 2"))).await.unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .expect("listener stops when the channel closes")
        .unwrap();

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["ok:1".to_string(), "ok:2".to_string()]);
}

fn help_router(count: usize) -> Arc<Router> {
    (0..count)
        .fold(Router::builder().prefix("!").default_help(None), |builder, i| {
            builder.command(Command::new(format!("cmd{}", i)).with_description(format!("does {}", i)))
        })
        .build()
}

#[tokio::test]
async fn test_help_pages_follow_reactions() {
    ensure_init();

    let router = help_router(7);
    let (recorder, bot) = bots();

    router.handle(bot.clone(), message("!help")).await;
    assert_eq!(
        recorder.sent(),
        vec![
            Sent::Embed { id: "msg-1".into(), title: "Command List (Page 1/2)".into() },
            Sent::React { id: "msg-1".into(), emoji: PREVIOUS_PAGE.into() },
            Sent::React { id: "msg-1".into(), emoji: CLOSE.into() },
            Sent::React { id: "msg-1".into(), emoji: NEXT_PAGE.into() },
        ]
    );

    let storage = router.storage(HELP_STORAGE).unwrap().clone();
    let key = page_key("channel", "msg-1", "user");
    assert_eq!(*storage.get::<usize>(&key).unwrap(), 1);

    // Reactions from other users and from the bot itself are ignored
    router.handle_reaction(bot.clone(), ReactionEvent::new("channel", "msg-1", "stranger", NEXT_PAGE)).await;
    router.handle_reaction(bot.clone(), ReactionEvent::new("channel", "msg-1", "0", NEXT_PAGE)).await;
    assert_eq!(recorder.sent().len(), 4);

    router.handle_reaction(bot.clone(), ReactionEvent::new("channel", "msg-1", "user", NEXT_PAGE)).await;
    router.handle_reaction(bot.clone(), ReactionEvent::new("channel", "msg-1", "user", NEXT_PAGE)).await;
    assert_eq!(*storage.get::<usize>(&key).unwrap(), 2);

    router.handle_reaction(bot.clone(), ReactionEvent::new("channel", "msg-1", "user", CLOSE)).await;
    assert!(!storage.contains(&key));

    assert_eq!(
        recorder.sent()[4..].to_vec(),
        vec![
            Sent::Edit { id: "msg-1".into(), title: "Command List (Page 2/2)".into() },
            Sent::Unreact { id: "msg-1".into(), emoji: NEXT_PAGE.into(), user: "user".into() },
            Sent::Edit { id: "msg-1".into(), title: "Command List (Page 2/2)".into() },
            Sent::Unreact { id: "msg-1".into(), emoji: NEXT_PAGE.into(), user: "user".into() },
            Sent::Delete("msg-1".into()),
        ]
    );
}

#[tokio::test]
async fn test_specific_help_walks_sub_commands() {
    ensure_init();

    let router = Router::builder()
        .prefix("!")
        .default_help(None)
        .command(Command::new("config").with_sub_command(Command::new("get").with_description("reads a key")))
        .build();
    let (recorder, bot) = bots();

    router.handle(bot.clone(), message("!help config get")).await;
    router.handle(bot, message("!help missing")).await;

    assert_eq!(
        recorder.sent(),
        vec![
            Sent::Embed { id: "msg-1".into(), title: "Command Information".into() },
            Sent::Embed { id: "msg-2".into(), title: "Error".into() },
        ]
    );
}

#[tokio::test]
async fn test_rejection_reports_remaining_cooldown() {
    ensure_init();

    let seen: Seen = Arc::default();
    let next_allowed: Arc<Mutex<Option<DateTime<Utc>>>> = Arc::default();
    let captured = next_allowed.clone();

    let limiter = DefaultRateLimiter::new(
        Duration::from_secs(5),
        Duration::from_secs(1),
        Some(handler(move |ctx: Context| {
            let captured = captured.clone();
            async move {
                let next = ctx.objects.get::<DateTime<Utc>>(NEXT_EXECUTION_KEY)?;
                *captured.lock().unwrap() = Some(*next);
                Ok(())
            }
        })),
    );

    let router = Router::builder()
        .prefix("!")
        .command(command("limited", &seen).with_rate_limiter(limiter))
        .build();
    let (_, bot) = bots();

    let first = router.handle(bot.clone(), message("!limited")).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second_at = Utc::now();
    let second = router.handle(bot, message("!limited")).await;

    assert!(matches!(first, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::Executed)));
    assert!(matches!(second, Dispatch::Resolved(ref r) if matches!(r.outcome, Outcome::RateLimited)));

    let next = (*next_allowed.lock().unwrap()).expect("rejection handler ran");
    let remaining = next - second_at;
    assert!(
        remaining > chrono::Duration::milliseconds(3_500) && remaining <= chrono::Duration::seconds(4),
        "unexpected remaining cooldown {:?}",
        remaining
    );
}

#[tokio::test]
async fn test_colliding_roots_fire_first_declared_only() {
    ensure_init();

    let seen: Seen = Arc::default();
    let router = Router::builder()
        .prefix("!")
        .command(labelled("dup", "dup-first", &seen))
        .command(labelled("dup", "dup-second", &seen))
        .command(labelled("first", "alias-owner", &seen).with_alias("x"))
        .command(labelled("x", "x-named", &seen))
        .build();
    let (_, bot) = bots();

    router.handle(bot.clone(), message("!dup a")).await;
    let dispatch = router.handle(bot, message("!x b")).await;

    assert_eq!(dispatch.command_name(), Some("first"));
    assert_eq!(*seen.lock().unwrap(), vec!["dup-first:a".to_string(), "alias-owner:b".to_string()]);
}

#[tokio::test]
async fn test_concurrent_help_reactions_commit_in_order() {
    ensure_init();

    // 13 commands with help itself, so three pages
    let router = help_router(12);
    let recorder = Arc::new(RecordingBot::with_edit_delay(Duration::from_millis(50)));
    let bot: Arc<dyn Bot> = recorder.clone();

    router.handle(bot.clone(), message("!help")).await;
    let storage = router.storage(HELP_STORAGE).unwrap().clone();
    let key = page_key("channel", "msg-1", "user");
    let reaction = |emoji: &str| ReactionEvent::new("channel", "msg-1", "user", emoji);

    tokio::join!(
        router.handle_reaction(bot.clone(), reaction(NEXT_PAGE)),
        router.handle_reaction(bot.clone(), reaction(NEXT_PAGE)),
    );
    assert_eq!(*storage.get::<usize>(&key).unwrap(), 3);

    // A close landing while a page turn is still editing wins
    let turning = {
        let router = router.clone();
        let bot = bot.clone();
        let event = reaction(PREVIOUS_PAGE);
        tokio::spawn(async move { router.handle_reaction(bot, event).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    router.handle_reaction(bot.clone(), reaction(CLOSE)).await;
    turning.await.unwrap();

    assert!(!storage.contains(&key));
    let deletes = recorder.sent().iter().filter(|sent| matches!(sent, Sent::Delete(_))).count();
    assert_eq!(deletes, 1);

    // Reactions on a closed page are ignored
    router.handle_reaction(bot, reaction(NEXT_PAGE)).await;
    assert!(!storage.contains(&key));
}
