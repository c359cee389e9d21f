use crate::domain::employee::Employee;
use crate::domain::survey::Survey;
use async_trait::async_trait;
use serde::Serialize;
use teloxide::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachKind {
    Invite,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

/// Delivery boundary. The engine only decides who to contact; this trait is
/// what actually reaches out, so tests and offline runs can substitute it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, employee: &Employee, survey: &Survey, kind: OutreachKind) -> DeliveryOutcome;
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")?;
        Ok(Self::new(token))
    }
}

fn message_for(employee: &Employee, survey: &Survey, kind: OutreachKind) -> String {
    let description = survey.description.as_deref().unwrap_or("");
    match kind {
        OutreachKind::Invite => format!(
            "Hi, {}!\n\nYou are invited to take the survey \"{}\".\n{}\n\nOpen the bot menu to begin.",
            employee.full_name, survey.title, description
        ),
        OutreachKind::Reminder => format!(
            "Hi, {}!\n\nA friendly reminder: the survey \"{}\" is still waiting for you.\nOpen the bot menu to continue.",
            employee.full_name, survey.title
        ),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(
        &self,
        employee: &Employee,
        survey: &Survey,
        kind: OutreachKind,
    ) -> DeliveryOutcome {
        let Some(telegram_id) = employee.telegram_id else {
            return DeliveryOutcome::Failed {
                reason: "employee has no telegram id".to_string(),
            };
        };
        let text = message_for(employee, survey, kind);
        match self.bot.send_message(ChatId(telegram_id), text).await {
            Ok(_) => {
                tracing::debug!(
                    "Sent {:?} to employee {} (telegram: {})",
                    kind,
                    employee.id,
                    telegram_id
                );
                DeliveryOutcome::Sent
            }
            Err(e) => {
                tracing::error!(
                    "Failed to send {:?} to employee {} (telegram: {}): {}",
                    kind,
                    employee.id,
                    telegram_id,
                    e
                );
                DeliveryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
