// src/services/scheduling.rs

//! Meeting requests between a learner and a pilot owner.
//!
//! PENDING is the only state that moves. ACCEPTED and FINALIZEDVIAEMAIL are final.

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        pilot::{EnrollStatus, PilotOwner},
        schedule::{CreateScheduleRequest, NewSchedule, Schedule, ScheduleList, ScheduleOutcome, ScheduleStatus},
        user::User,
    },
    services::notifier::{Notifier, ScheduleEvent},
    store::PortalStore,
};

/// Stored as `final_message` when the owner moves the conversation to email.
pub const FINALIZED_ACKNOWLEDGEMENT: &str = "The pilot owner will finalize this meeting with you by email.";

/// Parses an RFC 3339 timestamp that must lie strictly after `now`.
pub fn parse_future_time(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    let at = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid date and time '{}', expected RFC 3339", raw)))?
        .with_timezone(&Utc);

    if at <= now {
        return Err(AppError::BadRequest(
            "The meeting must be scheduled in the future".to_string(),
        ));
    }
    Ok(at)
}

async fn load_pilot(store: &dyn PortalStore, pilot_id: i64) -> Result<PilotOwner, AppError> {
    store
        .find_pilot_owner(pilot_id)
        .await?
        .ok_or(AppError::NotFound("Pilot not found".to_string()))
}

/// The owner must be reachable by email before a request can be made.
async fn resolve_owner(store: &dyn PortalStore, pilot_id: i64) -> Result<PilotOwner, AppError> {
    let owner = load_pilot(store, pilot_id).await?;
    if owner.owner_email.trim().is_empty() {
        return Err(AppError::NotFound("Pilot owner has no email address".to_string()));
    }
    Ok(owner)
}

async fn resolve_learner(store: &dyn PortalStore, user_id: i64) -> Result<User, AppError> {
    store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Creates a PENDING request after every eligibility check passes, then notifies the owner.
pub async fn create_schedule(
    store: &dyn PortalStore,
    notifier: &Notifier,
    user_id: i64,
    req: &CreateScheduleRequest,
    now: DateTime<Utc>,
) -> Result<ScheduleOutcome, AppError> {
    let at = parse_future_time(&req.scheduled_date_time, now)?;

    if let Some(existing) = store.find_pending_schedule(req.pilot_id, user_id).await? {
        return Err(AppError::PendingScheduleExists(existing.scheduled_date_time));
    }

    if store.enrollment_status(req.pilot_id, user_id).await? != Some(EnrollStatus::Approved) {
        return Err(AppError::Forbidden(
            "You must be enrolled in this pilot to request a meeting".to_string(),
        ));
    }

    if !store.has_passed_pilot_quiz(req.pilot_id, user_id).await? {
        return Err(AppError::BadRequest(
            "You must pass the pilot quiz before requesting a meeting".to_string(),
        ));
    }

    let pilot = resolve_owner(store, req.pilot_id).await?;
    let learner = resolve_learner(store, user_id).await?;

    let message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let schedule = store
        .insert_schedule(NewSchedule {
            pilot_id: pilot.pilot_id,
            user_id,
            owner_id: pilot.owner_id,
            scheduled_date_time: at,
            message,
        })
        .await?;

    tracing::info!(
        schedule_id = schedule.id,
        pilot_id = schedule.pilot_id,
        user_id,
        "schedule requested"
    );

    let notification_sent = notifier
        .dispatch(&ScheduleEvent::Requested {
            schedule: schedule.clone(),
            pilot,
            learner,
        })
        .await;

    Ok(ScheduleOutcome {
        schedule,
        notification_sent,
    })
}

/// Loads a schedule and checks the caller owns it and that it may still move to `to`.
async fn pending_owned_by(
    store: &dyn PortalStore,
    schedule_id: i64,
    caller_id: i64,
    to: ScheduleStatus,
) -> Result<Schedule, AppError> {
    let schedule = store
        .find_schedule(schedule_id)
        .await?
        .ok_or(AppError::NotFound("Schedule not found".to_string()))?;

    if schedule.owner_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the pilot owner can respond to this schedule".to_string(),
        ));
    }

    if !schedule.status.can_transition_to(to) {
        return Err(AppError::InvalidState(format!(
            "Schedule is already {}",
            schedule.status
        )));
    }

    Ok(schedule)
}

/// Applies a PENDING -> `to` transition. `Ok(None)` from the store means another
/// request got there first.
async fn transition(
    store: &dyn PortalStore,
    schedule: &Schedule,
    to: ScheduleStatus,
    final_message: Option<&str>,
) -> Result<Schedule, AppError> {
    match store.transition_schedule(schedule.id, to, final_message).await? {
        Some(updated) => {
            tracing::info!(
                schedule_id = updated.id,
                from = %schedule.status,
                to = %updated.status,
                "schedule transitioned"
            );
            Ok(updated)
        }
        None => {
            let current = store
                .find_schedule(schedule.id)
                .await?
                .map(|s| s.status)
                .unwrap_or(to);
            Err(AppError::InvalidState(format!("Schedule is already {}", current)))
        }
    }
}

pub async fn accept_schedule(
    store: &dyn PortalStore,
    notifier: &Notifier,
    schedule_id: i64,
    caller_id: i64,
) -> Result<ScheduleOutcome, AppError> {
    let pending = pending_owned_by(store, schedule_id, caller_id, ScheduleStatus::Accepted).await?;
    let pilot = load_pilot(store, pending.pilot_id).await?;
    let learner = resolve_learner(store, pending.user_id).await?;

    let schedule = transition(store, &pending, ScheduleStatus::Accepted, None).await?;

    let notification_sent = notifier
        .dispatch(&ScheduleEvent::Accepted {
            schedule: schedule.clone(),
            pilot,
            learner,
        })
        .await;

    Ok(ScheduleOutcome {
        schedule,
        notification_sent,
    })
}

/// Ends the request in FINALIZEDVIAEMAIL. `message` goes to the learner by
/// email; the row keeps `FINALIZED_ACKNOWLEDGEMENT`.
pub async fn finalize_schedule_via_email(
    store: &dyn PortalStore,
    notifier: &Notifier,
    schedule_id: i64,
    caller_id: i64,
    message: &str,
) -> Result<ScheduleOutcome, AppError> {
    let pending = pending_owned_by(store, schedule_id, caller_id, ScheduleStatus::FinalizedViaEmail).await?;
    let pilot = load_pilot(store, pending.pilot_id).await?;
    let learner = resolve_learner(store, pending.user_id).await?;

    let schedule = transition(
        store,
        &pending,
        ScheduleStatus::FinalizedViaEmail,
        Some(FINALIZED_ACKNOWLEDGEMENT),
    )
    .await?;

    let notification_sent = notifier
        .dispatch(&ScheduleEvent::FinalizedViaEmail {
            schedule: schedule.clone(),
            pilot,
            learner,
            owner_message: message.to_string(),
        })
        .await;

    Ok(ScheduleOutcome {
        schedule,
        notification_sent,
    })
}

pub async fn list_schedules(store: &dyn PortalStore, user_id: i64) -> Result<ScheduleList, AppError> {
    Ok(ScheduleList {
        requested: store.list_schedules_for_user(user_id).await?,
        received: store.list_schedules_for_owner(user_id).await?,
    })
}
