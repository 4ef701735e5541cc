// src/services/notifier.rs

//! Post-commit notifications for schedule transitions.
//!
//! An event is built only from a committed row. Sending is best-effort: the
//! outcome is reported, never propagated.

use std::sync::Arc;

use crate::{
    models::{pilot::PilotOwner, schedule::Schedule, user::User},
    utils::{
        email::{Mailer, OutgoingEmail},
        html::{clean_html, escape_text},
    },
};

#[derive(Debug, Clone)]
pub enum ScheduleEvent {
    /// A learner asked for a meeting; goes to the pilot owner.
    Requested {
        schedule: Schedule,
        pilot: PilotOwner,
        learner: User,
    },
    /// The owner accepted; goes to the learner.
    Accepted {
        schedule: Schedule,
        pilot: PilotOwner,
        learner: User,
    },
    /// The owner will arrange the meeting by email; goes to the learner.
    FinalizedViaEmail {
        schedule: Schedule,
        pilot: PilotOwner,
        learner: User,
        owner_message: String,
    },
}

impl ScheduleEvent {
    pub fn schedule(&self) -> &Schedule {
        match self {
            ScheduleEvent::Requested { schedule, .. }
            | ScheduleEvent::Accepted { schedule, .. }
            | ScheduleEvent::FinalizedViaEmail { schedule, .. } => schedule,
        }
    }

    pub fn render(&self) -> OutgoingEmail {
        match self {
            ScheduleEvent::Requested {
                schedule,
                pilot,
                learner,
            } => {
                let note = schedule
                    .message
                    .as_deref()
                    .map(|m| format!("<p>Message from the learner:</p><blockquote>{}</blockquote>", escape_text(m)))
                    .unwrap_or_default();
                OutgoingEmail {
                    to: pilot.owner_email.clone(),
                    subject: format!("New meeting request for {}", pilot.pilot_title),
                    html: format!(
                        "<p>Hello {},</p>\
                         <p>{} ({}) requested a meeting about <b>{}</b> on {}.</p>\
                         {}\
                         <p>Accept the request or follow up by email from your dashboard.</p>",
                        escape_text(&pilot.owner_name),
                        escape_text(&learner.name),
                        escape_text(&learner.email),
                        escape_text(&pilot.pilot_title),
                        schedule.scheduled_date_time.format("%Y-%m-%d %H:%M UTC"),
                        note,
                    ),
                }
            }
            ScheduleEvent::Accepted {
                schedule,
                pilot,
                learner,
            } => OutgoingEmail {
                to: learner.email.clone(),
                subject: format!("Your meeting request for {} was accepted", pilot.pilot_title),
                html: format!(
                    "<p>Hello {},</p>\
                     <p>{} accepted your meeting about <b>{}</b> on {}.</p>",
                    escape_text(&learner.name),
                    escape_text(&pilot.owner_name),
                    escape_text(&pilot.pilot_title),
                    schedule.scheduled_date_time.format("%Y-%m-%d %H:%M UTC"),
                ),
            },
            ScheduleEvent::FinalizedViaEmail {
                schedule,
                pilot,
                learner,
                owner_message,
            } => OutgoingEmail {
                to: learner.email.clone(),
                subject: format!("About your meeting request for {}", pilot.pilot_title),
                html: format!(
                    "<p>Hello {},</p>\
                     <p>{} will finalize your meeting about <b>{}</b> (requested for {}) by email.</p>\
                     <div>{}</div>\
                     <p>You can reply to {}.</p>",
                    escape_text(&learner.name),
                    escape_text(&pilot.owner_name),
                    escape_text(&pilot.pilot_title),
                    schedule.scheduled_date_time.format("%Y-%m-%d %H:%M UTC"),
                    clean_html(owner_message),
                    escape_text(&pilot.owner_email),
                ),
            },
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Sends the email for `event`. Returns whether it was handed to the mailer.
    pub async fn dispatch(&self, event: &ScheduleEvent) -> bool {
        let email = event.render();
        let schedule_id = event.schedule().id;
        match self.mailer.send(email).await {
            Ok(()) => {
                tracing::info!(schedule_id, "schedule notification sent");
                true
            }
            Err(e) => {
                tracing::warn!(schedule_id, error = %e, "schedule notification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schedule::ScheduleStatus;
    use chrono::{TimeZone, Utc};

    fn fixture(message: Option<&str>) -> (Schedule, PilotOwner, User) {
        let at = Utc.with_ymd_and_hms(2031, 5, 6, 14, 30, 0).unwrap();
        let schedule = Schedule {
            id: 1,
            pilot_id: 2,
            user_id: 3,
            owner_id: 4,
            scheduled_date_time: at,
            status: ScheduleStatus::Pending,
            message: message.map(str::to_string),
            final_message: None,
            created_at: at,
            updated_at: at,
        };
        let pilot = PilotOwner {
            pilot_id: 2,
            pilot_title: "Rust Basics".to_string(),
            owner_id: 4,
            owner_name: "Olive".to_string(),
            owner_email: "olive@example.com".to_string(),
        };
        let learner = User {
            id: 3,
            email: "lee@example.com".to_string(),
            name: "Lee".to_string(),
            password: String::new(),
            role: "learner".to_string(),
            created_at: None,
        };
        (schedule, pilot, learner)
    }

    #[test]
    fn test_request_goes_to_owner_with_escaped_message() {
        let (schedule, pilot, learner) = fixture(Some("<script>x</script>"));
        let email = ScheduleEvent::Requested {
            schedule,
            pilot,
            learner,
        }
        .render();

        assert_eq!(email.to, "olive@example.com");
        assert!(email.html.contains("2031-05-06 14:30 UTC"));
        assert!(!email.html.contains("<script>"));
    }

    #[test]
    fn test_finalize_goes_to_learner_with_owner_message() {
        let (schedule, pilot, learner) = fixture(None);
        let email = ScheduleEvent::FinalizedViaEmail {
            schedule,
            pilot,
            learner,
            owner_message: "<p>Let's meet on <b>Friday</b></p>".to_string(),
        }
        .render();

        assert_eq!(email.to, "lee@example.com");
        assert!(email.html.contains("<b>Friday</b>"));
    }
}
