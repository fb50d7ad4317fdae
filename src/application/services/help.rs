//! Default help command with reaction-driven pagination

use std::sync::Arc;
use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::application::messaging::context::{Context, HandlerResult};
use crate::application::messaging::rate_limiter::RateLimiter;
use crate::application::messaging::router::{ReactionListener, Router, RouterBuilder};
use crate::domain::entities::{Command, Embed, ReactionEvent};
use crate::domain::traits::Bot;

/// Router storage holding the current page of every open help message
pub const HELP_STORAGE: &str = "help_messages";

pub const PREVIOUS_PAGE: &str = "⬅️";
pub const CLOSE: &str = "❌";
pub const NEXT_PAGE: &str = "➡️";

const PAGE_SIZE: usize = 5;
const INFO_COLOR: u32 = 0xffff00;
const ERROR_COLOR: u32 = 0xff0000;

impl RouterBuilder {
    /// Register the `help` command and the reaction listener paging through it
    pub fn default_help(self, rate_limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        let help = Command::new("help")
            .with_description("Lists all the available commands or displays some information about a specific command")
            .with_usage("help [command name]")
            .with_example("help yourCommand")
            .ignore_case(true)
            .with_shared_rate_limiter(rate_limiter)
            .with_handler(general_help);

        self.storage(HELP_STORAGE)
            .reaction_listener(HelpPaginator)
            .command(help)
    }
}

/// Key of a help message opened by `user_id`
pub fn page_key(channel_id: &str, message_id: &str, user_id: &str) -> String {
    format!("{}:{}:{}", channel_id, message_id, user_id)
}

async fn general_help(ctx: Context) -> HandlerResult {
    if ctx.arguments.amount() > 0 {
        return specific_help(ctx).await;
    }

    let (embed, page) = render_general_help(&ctx.router, 1);
    let message_id = ctx.respond_embed(&embed).await?;

    for emoji in [PREVIOUS_PAGE, CLOSE, NEXT_PAGE] {
        ctx.bot.add_reaction(ctx.channel_id(), &message_id, emoji).await?;
    }

    if let Some(storage) = ctx.router.storage(HELP_STORAGE) {
        storage.set(page_key(ctx.channel_id(), &message_id, ctx.author_id()), page);
    }
    Ok(())
}

async fn specific_help(ctx: Context) -> HandlerResult {
    let mut names = ctx.arguments.tokens().iter();
    let mut command = names
        .next()
        .and_then(|name| ctx.router.command(name.raw()))
        .cloned();

    for name in names {
        let Some(current) = command else {
            break;
        };
        command = current.sub_command(name.raw()).cloned();
    }

    let embed = render_specific_help(prefix(&ctx.router), command.as_deref());
    ctx.respond_embed(&embed).await?;
    Ok(())
}

fn prefix(router: &Router) -> &str {
    router.prefixes().first().map(String::as_str).unwrap_or("")
}

fn page_count(router: &Router) -> usize {
    router.commands().len().div_ceil(PAGE_SIZE).max(1)
}

/// Render `page` of the command list, clamped to the available pages
pub fn render_general_help(router: &Router, page: usize) -> (Embed, usize) {
    let commands = router.commands();
    let pages = page_count(router);
    let page = page.clamp(1, pages);

    let start = ((page - 1) * PAGE_SIZE).min(commands.len());
    let end = (start + PAGE_SIZE).min(commands.len());

    let embed = commands[start..end].iter().fold(
        Embed::new(format!("Command List (Page {}/{})", page, pages))
            .with_color(INFO_COLOR)
            .with_description(format!(
                "These are all the available commands. Type `{}help <command name>` to find out more about a specific command.",
                prefix(router)
            )),
        |embed, command| embed.with_field(&command.name, format!("`{}`", command.description)),
    );

    (embed, page)
}

/// Render the details of one command, or an error if it does not exist
pub fn render_specific_help(prefix: &str, command: Option<&Command>) -> Embed {
    let Some(command) = command else {
        return Embed::new("Error").with_color(ERROR_COLOR).with_field(
            "Message",
            format!(
                "```The given command doesn't exist. Type `{}help` for a list of available commands.```",
                prefix
            ),
        );
    };

    let sub_commands = if command.sub_commands.is_empty() {
        "No sub commands".to_string()
    } else {
        let names: Vec<&str> = command.sub_commands.iter().map(|c| c.name.as_str()).collect();
        format!("`{}`", names.join("`, `"))
    };

    let aliases = if command.aliases.is_empty() {
        "No aliases".to_string()
    } else {
        format!("`{}`", command.aliases.join("`, `"))
    };

    Embed::new("Command Information")
        .with_color(INFO_COLOR)
        .with_description(format!("Displaying the information for the `{}` command.", command.name))
        .with_field("Name", format!("`{}`", command.name))
        .with_field("Sub Commands", sub_commands)
        .with_field("Aliases", aliases)
        .with_field("Description", format!("```{}```", command.description))
        .with_field("Usage", format!("```{}{}```", prefix, command.usage))
        .with_field("Example", format!("```{}{}```", prefix, command.example))
}

/// Turns help pages when their author reacts to them
pub struct HelpPaginator;

#[async_trait]
impl ReactionListener for HelpPaginator {
    async fn on_reaction(&self, router: &Arc<Router>, bot: Arc<dyn Bot>, event: &ReactionEvent) -> Result<(), BotError> {
        if event.user_id == bot.bot_info().id {
            return Ok(());
        }

        let Some(storage) = router.storage(HELP_STORAGE) else {
            return Ok(());
        };
        let key = page_key(&event.channel_id, &event.message_id, &event.user_id);

        let turn: fn(usize) -> usize = match event.emoji.as_str() {
            PREVIOUS_PAGE => |page| page.saturating_sub(1),
            NEXT_PAGE => |page| page + 1,
            CLOSE => {
                let mut open = false;
                storage.update::<usize, _>(&key, |page| {
                    open = page.is_some();
                    None
                });
                if open {
                    bot.delete_message(&event.channel_id, &event.message_id).await?;
                }
                return Ok(());
            }
            _ => return Ok(()),
        };

        // The page is committed before any await so concurrent turns and
        // closes see each other
        let pages = page_count(router);
        let Some(page) = storage.update::<usize, _>(&key, |page| page.map(|page| turn(*page).clamp(1, pages))) else {
            return Ok(());
        };

        let (embed, _) = render_general_help(router, *page);
        bot.edit_embed(&event.channel_id, &event.message_id, &embed).await?;
        bot.remove_reaction(&event.channel_id, &event.message_id, &event.emoji, &event.user_id).await?;
        Ok(())
    }
}
