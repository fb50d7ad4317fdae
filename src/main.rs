use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use chat_router::application::messaging::{
    DefaultRateLimiter, Handler, HandlerFuture, LoggingMiddleware, RateLimiter, Router, NEXT_EXECUTION_KEY,
    handler,
};
use chat_router::domain::entities::Command;
use chat_router::domain::traits::Bot;
use chat_router::infrastructure::adapters::console::ConsoleAdapter;
use chat_router::infrastructure::config::Config;
use chat_router::{BotError, Context};

#[derive(Parser)]
#[command(name = "chat-router")]
#[command(about = "A command router for chat bots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the console
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run => run_bot(&cli.config),
        Commands::Version => {
            println!("chat-router v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::InitConfig => init_config(&cli.config),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run_bot(config_path: &str) -> Result<(), BotError> {
    // Load config
    let config = if std::path::Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    if !config.adapters.console.as_ref().is_some_and(|c| c.enabled) {
        tracing::warn!("No adapter enabled, nothing to run");
        return Ok(());
    }

    tracing::info!("Starting {} with prefixes {:?}", config.bot.name, config.router.prefixes);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let router = build_router(&config);
        let adapter = Arc::new(ConsoleAdapter::new(&config.bot.name));
        let bot: Arc<dyn Bot> = adapter.clone();

        let (tx, rx) = mpsc::channel(64);
        let listener = tokio::spawn(router.listen(bot, rx));

        adapter.read_events(tx).await?;
        listener
            .await
            .map_err(|e| BotError::Internal(e.to_string()))
    })
}

fn build_router(config: &Config) -> Arc<Router> {
    let help_limiter: Arc<dyn RateLimiter> = Arc::new(DefaultRateLimiter::new(
        config.rate_limit.cooldown(),
        config.rate_limit.cleanup_interval(),
        None,
    ));

    let obj_limiter = DefaultRateLimiter::new(
        config.rate_limit.cooldown(),
        config.rate_limit.cleanup_interval(),
        Some(handler(rate_limited)),
    );

    config
        .router
        .builder()
        .ping_handler(|ctx: Context| async move {
            ctx.respond_text("Pong!").await?;
            Ok(())
        })
        .middleware(LoggingMiddleware)
        .middleware(inject_object)
        .default_help(Some(help_limiter))
        .command(
            Command::new("obj")
                .with_alias("object")
                .with_description("Responds with the injected custom object")
                .with_usage("obj")
                .with_example("obj")
                .ignore_case(true)
                .with_rate_limiter(obj_limiter)
                .with_handler(obj_command),
        )
        .command(
            Command::new("echo")
                .with_alias("say")
                .with_description("Repeats the given text")
                .with_usage("echo [upper] <text>")
                .with_example("echo upper hello")
                .ignore_case(true)
                .with_sub_command(
                    Command::new("upper")
                        .with_description("Repeats the given text in upper case")
                        .with_usage("echo upper <text>")
                        .ignore_case(true)
                        .with_handler(|ctx: Context| async move {
                            ctx.respond_text(&ctx.arguments.raw().to_uppercase()).await?;
                            Ok(())
                        }),
                )
                .with_handler(|ctx: Context| async move {
                    ctx.respond_text(ctx.arguments.raw()).await?;
                    Ok(())
                }),
        )
        .build()
}

/// Sets the custom object consumed by `obj`
fn inject_object(next: Handler) -> Handler {
    Arc::new(move |ctx: Context| -> HandlerFuture {
        ctx.objects.set("myObject", 69i64);
        next(ctx)
    })
}

async fn obj_command(ctx: Context) -> Result<(), BotError> {
    let value = ctx.objects.get::<i64>("myObject")?;
    ctx.respond_text(&value.to_string()).await?;
    Ok(())
}

async fn rate_limited(ctx: Context) -> Result<(), BotError> {
    let text = match ctx.objects.get_opt::<chrono::DateTime<chrono::Utc>>(NEXT_EXECUTION_KEY) {
        Some(next) => format!("You are being rate limited! Try again at {}", next.format("%H:%M:%S")),
        None => "You are being rate limited!".to_string(),
    };
    ctx.respond_text(&text).await?;
    Ok(())
}

fn init_config(path: &str) -> Result<(), BotError> {
    let yaml = Config::default().to_yaml()?;
    std::fs::write(path, yaml)?;
    println!("Config written to {}", path);
    Ok(())
}
