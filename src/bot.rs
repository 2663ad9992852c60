use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use crate::attendance::Session;
use crate::error::{StoreError, TrackerError};
use crate::messages::{self, BUTTON_CLOCK_IN, BUTTON_CLOCK_OUT, BUTTON_STATUS, BUTTON_SUMMARY};
use crate::reminder::Reminders;
use crate::tracker::Tracker;

#[derive(Debug, teloxide::macros::BotCommands, Clone, PartialEq)]
#[command(rename_rule = "lowercase", description = "Comandos disponibles:")]
pub enum Command {
    #[command(description = "Mostrar el teclado (/start fichar registra la entrada)")]
    Start(String),
    #[command(description = "Mostrar esta ayuda")]
    Help,
    #[command(description = "Fichar entrada")]
    Entrar,
    #[command(description = "Fichar salida")]
    Salir,
    #[command(description = "Estado de la jornada")]
    Estado,
    #[command(description = "Resumen semanal")]
    Resumen,
}

/// What a keyboard button or command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ClockIn,
    ClockOut,
    Status,
    Summary,
}

impl Action {
    pub fn from_label(text: &str) -> Option<Self> {
        match text.trim() {
            BUTTON_CLOCK_IN => Some(Action::ClockIn),
            BUTTON_CLOCK_OUT => Some(Action::ClockOut),
            BUTTON_STATUS => Some(Action::Status),
            BUTTON_SUMMARY => Some(Action::Summary),
            _ => None,
        }
    }
}

pub fn keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(BUTTON_CLOCK_IN), KeyboardButton::new(BUTTON_CLOCK_OUT)],
        vec![KeyboardButton::new(BUTTON_STATUS), KeyboardButton::new(BUTTON_SUMMARY)],
    ])
    .resize_keyboard()
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter_map(|msg: Message| msg.text().and_then(Action::from_label))
                .endpoint(handle_button),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    tracker: Arc<Tracker>,
    reminders: Arc<Reminders>,
) -> Result<()> {
    info!(chat_id = %msg.chat.id, from = ?msg.from.as_ref().map(|u| u.id.0), command = ?cmd, "Command received");
    let chat_id = msg.chat.id;
    match cmd {
        Command::Start(arg) if arg.trim() == "fichar" => {
            bot.send_message(chat_id, messages::deep_link_clock_in()).await?;
            run_action(&bot, chat_id, Action::ClockIn, &tracker, &reminders).await
        }
        Command::Start(_) => {
            let name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or_default();
            reply(&bot, chat_id, messages::welcome(name)).await
        }
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string())
                .reply_markup(keyboard())
                .await?;
            Ok(())
        }
        Command::Entrar => run_action(&bot, chat_id, Action::ClockIn, &tracker, &reminders).await,
        Command::Salir => run_action(&bot, chat_id, Action::ClockOut, &tracker, &reminders).await,
        Command::Estado => run_action(&bot, chat_id, Action::Status, &tracker, &reminders).await,
        Command::Resumen => run_action(&bot, chat_id, Action::Summary, &tracker, &reminders).await,
    }
}

async fn handle_button(
    bot: Bot,
    msg: Message,
    action: Action,
    tracker: Arc<Tracker>,
    reminders: Arc<Reminders>,
) -> Result<()> {
    info!(chat_id = %msg.chat.id, ?action, "Button pressed");
    run_action(&bot, msg.chat.id, action, &tracker, &reminders).await
}

async fn run_action(
    bot: &Bot,
    chat_id: ChatId,
    action: Action,
    tracker: &Arc<Tracker>,
    reminders: &Reminders,
) -> Result<()> {
    let user_id = chat_id.to_string();
    let now = tracker.now();
    let tz = tracker.tz();

    let text = match action {
        Action::ClockIn => {
            let bot = bot.clone();
            let notify = move |outcome: Result<Session, StoreError>| async move {
                if let Err(err) = notify_auto_clock_out(&bot, chat_id, tz, outcome).await {
                    warn!(chat_id = %chat_id, error = %err, "auto clock-out: error");
                }
            };
            match clock_in_and_arm(tracker, reminders, &user_id, now, notify).await {
                Ok(entry) => messages::clocked_in(entry, tz),
                Err(err) => failure_text(&user_id, err),
            }
        }
        Action::ClockOut => match clock_out_and_disarm(tracker, reminders, &user_id, now).await {
            Ok(session) => messages::clocked_out(&session, tz),
            Err(err) => failure_text(&user_id, err),
        },
        Action::Status => {
            let status = tracker.status(&user_id, now).await;
            debug!(user_id, reminder_armed = reminders.is_armed(&user_id), "Status requested");
            messages::status(&status, tz)
        }
        Action::Summary => match tracker.weekly_summary(&user_id, now).await {
            Ok(summary) => messages::weekly_summary(&summary),
            Err(err) => failure_text(&user_id, err),
        },
    };
    reply(bot, chat_id, text).await
}

fn failure_text(user_id: &str, err: TrackerError) -> String {
    match err {
        TrackerError::Attendance(reason) => {
            debug!(user_id, %reason, "Operation rejected");
            messages::rejected(reason).to_string()
        }
        TrackerError::Storage(err) => {
            error!(user_id, error = %err, "Failed to persist attendance");
            messages::storage_failed().to_string()
        }
    }
}

/// Clocks in and arms the end-of-workday reminder. When it fires, `notify` gets
/// the session it closed, or the storage error; nothing if the user already left.
async fn clock_in_and_arm<N, Fut>(
    tracker: &Arc<Tracker>,
    reminders: &Reminders,
    user_id: &str,
    now: DateTime<Tz>,
    notify: N,
) -> Result<DateTime<FixedOffset>, TrackerError>
where
    N: FnOnce(Result<Session, StoreError>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let entry = tracker.clock_in(user_id, now).await?;
    let delay = tracker.reminder_delay(entry, now);
    let tracker = Arc::clone(tracker);
    let key = user_id.to_owned();
    reminders.arm(user_id, delay, move || async move {
        match tracker.auto_clock_out(&key, tracker.now()).await {
            Ok(Some(session)) => {
                info!(user_id = %key, "auto clock-out: workday complete");
                notify(Ok(session)).await;
            }
            Ok(None) => {}
            Err(err) => {
                error!(user_id = %key, error = %err, "auto clock-out: failed to persist");
                notify(Err(err)).await;
            }
        }
    });
    Ok(entry)
}

async fn clock_out_and_disarm(
    tracker: &Tracker,
    reminders: &Reminders,
    user_id: &str,
    now: DateTime<Tz>,
) -> Result<Session, TrackerError> {
    let session = tracker.clock_out(user_id, now).await?;
    reminders.disarm(user_id);
    Ok(session)
}

async fn notify_auto_clock_out(
    bot: &Bot,
    chat_id: ChatId,
    tz: Tz,
    outcome: Result<Session, StoreError>,
) -> Result<()> {
    match outcome {
        Ok(session) => {
            reply(bot, chat_id, messages::clocked_out(&session, tz)).await?;
            reply(bot, chat_id, messages::auto_clock_out()).await?;
        }
        Err(_) => reply(bot, chat_id, messages::storage_failed()).await?,
    }
    Ok(())
}

async fn reply(bot: &Bot, chat_id: ChatId, text: impl Into<String>) -> Result<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard())
        .await?;
    Ok(())
}
