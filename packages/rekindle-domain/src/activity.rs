use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::{ConversationSummary, Role};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
	WaitingForUser,
	RecentlyActive,
	UpcomingSoon,
	ReadyForCheckin,
	AlreadySent,
}
impl ActivityState {
	pub const ALL: [Self; 5] = [
		Self::WaitingForUser,
		Self::RecentlyActive,
		Self::UpcomingSoon,
		Self::ReadyForCheckin,
		Self::AlreadySent,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::WaitingForUser => "waiting_for_user",
			Self::RecentlyActive => "recently_active",
			Self::UpcomingSoon => "upcoming_soon",
			Self::ReadyForCheckin => "ready_for_checkin",
			Self::AlreadySent => "already_sent",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
	pub recent_cutoff_hours: f64,
	pub ready_cutoff_hours: f64,
}
impl Default for Thresholds {
	fn default() -> Self {
		Self { recent_cutoff_hours: 48.0, ready_cutoff_hours: 72.0 }
	}
}
impl From<&rekindle_config::Detector> for Thresholds {
	fn from(cfg: &rekindle_config::Detector) -> Self {
		Self {
			recent_cutoff_hours: f64::from(cfg.recent_cutoff_hours),
			ready_cutoff_hours: f64::from(cfg.ready_cutoff_hours),
		}
	}
}

/// Fractional hours from `then` to `now`. Negative when `then` is in the future.
pub fn hours_since(then: OffsetDateTime, now: OffsetDateTime) -> f64 {
	(now - then).as_seconds_f64() / 3_600.0
}

/// Ordered rules, first match wins. A pending check-in always suppresses; after that the
/// assistant having spoken last takes precedence over any age bucket.
pub fn classify(
	summary: &ConversationSummary,
	now: OffsetDateTime,
	thresholds: &Thresholds,
) -> ActivityState {
	if summary.has_recent_checkin {
		return ActivityState::AlreadySent;
	}
	if summary.last_sender == Role::Assistant {
		return ActivityState::WaitingForUser;
	}

	let hours = hours_since(summary.last_message_time, now);

	if hours >= thresholds.ready_cutoff_hours {
		ActivityState::ReadyForCheckin
	} else if hours >= thresholds.recent_cutoff_hours {
		ActivityState::UpcomingSoon
	} else {
		ActivityState::RecentlyActive
	}
}

/// Whether a conversation should receive a re-engagement email now: the assistant spoke last and
/// the silence has lasted at least the ready cutoff.
pub fn is_due(summary: &ConversationSummary, now: OffsetDateTime, thresholds: &Thresholds) -> bool {
	classify(summary, now, thresholds) == ActivityState::WaitingForUser
		&& hours_since(summary.last_message_time, now) >= thresholds.ready_cutoff_hours
}
