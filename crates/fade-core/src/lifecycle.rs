//! # Appointment Lifecycle
//!
//! Status transitions of an appointment and the side effects each one asks
//! the caller to run.
//!
//! ## State Machine
//! ```text
//!                Confirm            Start              Complete{payment}
//!  scheduled ─────────────► confirmed ─────► in_progress ─────────────► completed
//!      │                                         │                         ▲
//!      │                                         │                         │
//!      ├──── Cancel ──────► cancelled ◄──────────┤    (settlement only) ───┘
//!      └──── MarkNoShow ──► no_show   ◄──────────┘
//! ```
//!
//! `completed`, `cancelled` and `no_show` are terminal: every event is
//! rejected with [`CoreError::InvalidTransition`].
//!
//! [`transition`] never mutates anything. It returns the next status and
//! the [`Effect`]s to perform; persisting the status is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::AppointmentStatus;

// =============================================================================
// Events & Effects
// =============================================================================

/// Something that happened to an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Event {
    Confirm,
    Start,
    /// Issued by the settlement pipeline once the payment row exists.
    Complete { payment_id: String },
    Cancel,
    MarkNoShow,
}

impl Event {
    /// Verb used in error messages and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Event::Confirm => "confirm",
            Event::Start => "start",
            Event::Complete { .. } => "complete",
            Event::Cancel => "cancel",
            Event::MarkNoShow => "mark as no-show",
        }
    }
}

/// Client-facing notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Notification {
    Confirmed,
    Cancelled,
}

/// Work the caller must do after persisting a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Effect {
    NotifyClient { notification: Notification },
    /// Reference point for the elapsed-time display.
    StartServiceTimer {
        #[ts(as = "String")]
        at: DateTime<Utc>,
    },
}

/// Inputs a transition may depend on.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
}

/// Outcome of an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: AppointmentStatus,
    pub next: AppointmentStatus,
    pub effects: Vec<Effect>,
}

// =============================================================================
// Transition Function
// =============================================================================

/// Applies `event` to `status`.
///
/// ## Errors
/// - [`CoreError::InvalidTransition`] for any event on a terminal status,
///   a confirm after the start time, or a move the graph does not allow
/// - [`CoreError::SettlementRequired`] for `Complete` without a payment id
pub fn transition(
    status: AppointmentStatus,
    event: &Event,
    ctx: &TransitionContext,
) -> CoreResult<Transition> {
    use AppointmentStatus::*;

    let reject = || CoreError::InvalidTransition {
        from: status.to_string(),
        event: event.name().to_string(),
    };

    if status.is_terminal() {
        return Err(reject());
    }

    let (next, effects) = match (status, event) {
        (Scheduled, Event::Confirm) => {
            if ctx.now >= ctx.starts_at {
                return Err(reject());
            }
            (
                Confirmed,
                vec![Effect::NotifyClient {
                    notification: Notification::Confirmed,
                }],
            )
        }

        (Confirmed, Event::Start) => {
            (InProgress, vec![Effect::StartServiceTimer { at: ctx.now }])
        }

        (_, Event::Complete { payment_id }) => {
            if payment_id.trim().is_empty() {
                return Err(CoreError::SettlementRequired(status.to_string()));
            }
            (Completed, Vec::new())
        }

        (_, Event::Cancel) => (
            Cancelled,
            vec![Effect::NotifyClient {
                notification: Notification::Cancelled,
            }],
        ),

        (_, Event::MarkNoShow) => (NoShow, Vec::new()),

        _ => return Err(reject()),
    };

    Ok(Transition {
        from: status,
        next,
        effects,
    })
}

/// Checks that an appointment in `status` can still be settled.
pub fn can_settle(status: AppointmentStatus) -> CoreResult<()> {
    if status.is_terminal() {
        return Err(CoreError::InvalidTransition {
            from: status.to_string(),
            event: "complete".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use AppointmentStatus::*;

    fn ctx() -> TransitionContext {
        let starts_at = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        TransitionContext {
            now: starts_at - Duration::hours(2),
            starts_at,
        }
    }

    fn paid() -> Event {
        Event::Complete {
            payment_id: "pay-1".to_string(),
        }
    }

    #[test]
    fn test_happy_path() {
        let c = ctx();
        let confirmed = transition(Scheduled, &Event::Confirm, &c).unwrap();
        assert_eq!(confirmed.next, Confirmed);
        assert_eq!(
            confirmed.effects,
            vec![Effect::NotifyClient {
                notification: Notification::Confirmed
            }]
        );

        let started = transition(Confirmed, &Event::Start, &c).unwrap();
        assert_eq!(started.next, InProgress);
        assert_eq!(started.effects, vec![Effect::StartServiceTimer { at: c.now }]);

        let done = transition(InProgress, &paid(), &c).unwrap();
        assert_eq!(done.next, Completed);
        assert!(done.effects.is_empty());
    }

    #[test]
    fn test_confirm_only_before_start() {
        let mut c = ctx();
        c.now = c.starts_at;
        let err = transition(Scheduled, &Event::Confirm, &c).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_start_requires_confirmation() {
        let err = transition(Scheduled, &Event::Start, &ctx()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let started = transition(Confirmed, &Event::Start, &ctx()).unwrap();
        assert_eq!(started.next, InProgress);
    }

    #[test]
    fn test_complete_requires_payment() {
        let err = transition(
            InProgress,
            &Event::Complete {
                payment_id: " ".to_string(),
            },
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::SettlementRequired(_)));
    }

    #[test]
    fn test_escapes_from_every_open_status() {
        for status in [Scheduled, Confirmed, InProgress] {
            let cancelled = transition(status, &Event::Cancel, &ctx()).unwrap();
            assert_eq!(cancelled.next, Cancelled);
            assert_eq!(
                cancelled.effects,
                vec![Effect::NotifyClient {
                    notification: Notification::Cancelled
                }]
            );

            let no_show = transition(status, &Event::MarkNoShow, &ctx()).unwrap();
            assert_eq!(no_show.next, NoShow);
            assert!(no_show.effects.is_empty());
        }
    }

    #[test]
    fn test_backwards_moves_are_rejected() {
        assert!(transition(Confirmed, &Event::Confirm, &ctx()).is_err());
        assert!(transition(InProgress, &Event::Confirm, &ctx()).is_err());
        assert!(transition(InProgress, &Event::Start, &ctx()).is_err());
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        let events = [Event::Confirm, Event::Start, paid(), Event::Cancel, Event::MarkNoShow];
        for status in [Completed, Cancelled, NoShow] {
            for event in &events {
                let err = transition(status, event, &ctx()).unwrap_err();
                assert!(
                    matches!(err, CoreError::InvalidTransition { .. }),
                    "{} accepted {}",
                    status,
                    event.name()
                );
            }
            assert!(can_settle(status).is_err());
        }
    }

    #[test]
    fn test_can_settle_open_statuses() {
        for status in [Scheduled, Confirmed, InProgress] {
            assert!(can_settle(status).is_ok());
        }
    }

    #[test]
    fn test_event_serde_shape() {
        let json = serde_json::to_string(&paid()).unwrap();
        assert_eq!(json, r#"{"type":"complete","payment_id":"pay-1"}"#);
        let json = serde_json::to_string(&Event::MarkNoShow).unwrap();
        assert_eq!(json, r#"{"type":"mark_no_show"}"#);
    }
}
