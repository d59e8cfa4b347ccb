//! Discord front end: slash and `/`-prefixed commands plus direct-message
//! delivery for the watcher.

use crate::commands::CourseCommands;
use crate::watcher::Notifier;
use crate::{BotError, BotResult};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, BotData, Error>;

pub struct BotData {
    commands: CourseCommands,
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {}", error);
            std::process::exit(1);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command `{}` failed: {}", ctx.command().name, error);
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Show this help menu
#[poise::command(prefix_command, track_edits, slash_command)]
async fn help(
    ctx: Context<'_>,
    #[description = "Command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration::default(),
    )
    .await?;
    Ok(())
}

/// Watch a course for free seats
#[poise::command(prefix_command, slash_command)]
async fn add_course(
    ctx: Context<'_>,
    #[description = "Course serial number"] course_id: String,
) -> Result<(), Error> {
    let reply = ctx
        .data()
        .commands
        .add_course(ctx.author().id.get(), &course_id)
        .await?;
    ctx.say(reply).await?;
    Ok(())
}

/// List the courses you are watching
#[poise::command(prefix_command, slash_command)]
async fn list_course(ctx: Context<'_>) -> Result<(), Error> {
    let reply = ctx.data().commands.list_course(ctx.author().id.get()).await?;
    ctx.say(reply).await?;
    Ok(())
}

/// Stop watching a course
#[poise::command(prefix_command, slash_command)]
async fn remove_course(
    ctx: Context<'_>,
    #[description = "Course serial number"] course_id: String,
) -> Result<(), Error> {
    let reply = ctx
        .data()
        .commands
        .remove_course(ctx.author().id.get(), &course_id)
        .await?;
    ctx.say(reply).await?;
    Ok(())
}

/// Check every watched course right now
#[poise::command(prefix_command, slash_command)]
async fn force_update(ctx: Context<'_>) -> Result<(), Error> {
    let reply = ctx.data().commands.force_update()?;
    ctx.say(reply).await?;
    Ok(())
}

fn framework_options() -> poise::FrameworkOptions<BotData, Error> {
    poise::FrameworkOptions {
        commands: vec![
            help(),
            add_course(),
            list_course(),
            remove_course(),
            force_update(),
        ],
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some("/".into()),
            edit_tracker: Some(Arc::new(poise::EditTracker::for_timespan(
                Duration::from_secs(3600),
            ))),
            ..Default::default()
        },
        on_error: |error| Box::pin(on_error(error)),
        pre_command: |ctx| {
            Box::pin(async move {
                debug!("Running command {}", ctx.command().qualified_name);
            })
        },
        post_command: |ctx| {
            Box::pin(async move {
                debug!("Finished command {}", ctx.command().qualified_name);
            })
        },
        event_handler: |_ctx, event, _framework, _data| {
            Box::pin(async move {
                trace!("Gateway event {}", event.snake_case_name());
                Ok(())
            })
        },
        ..Default::default()
    }
}

/// Prefix commands in guild channels need the privileged message content
/// intent; it has to be enabled for the application in the developer portal.
fn gateway_intents() -> serenity::GatewayIntents {
    serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT
}

/// Build the Discord client. Commands are registered globally once the
/// gateway reports ready.
pub async fn client(
    token: &str,
    commands: CourseCommands,
) -> Result<serenity::Client, serenity::Error> {
    let framework = poise::Framework::builder()
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(BotData { commands })
            })
        })
        .options(framework_options())
        .build();

    serenity::ClientBuilder::new(token, gateway_intents())
        .framework(framework)
        .await
}

/// Drive the gateway session until it ends or `shutdown` completes. A session
/// that ends on its own is returned as is, so a failed start surfaces as an
/// error; shutdown yields `Ok`.
pub async fn run_until_shutdown<E>(
    session: impl Future<Output = Result<(), E>>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), E> {
    tokio::select! {
        result = session => result,
        () = shutdown => Ok(()),
    }
}

/// Sends vacancy notices as direct messages
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, user: u64, message: &str) -> BotResult<()> {
        serenity::UserId::new(user)
            .direct_message(
                self.http.as_ref(),
                serenity::CreateMessage::new().content(message),
            )
            .await
            .map_err(|e| BotError::Notify {
                user,
                reason: e.to_string(),
            })?;
        debug!("Notified user {}", user);
        Ok(())
    }
}
