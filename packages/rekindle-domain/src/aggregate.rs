use std::collections::BTreeMap;

use crate::model::{ChatEvent, ConversationKey, ConversationSummary};

#[derive(Debug, Default)]
pub struct Aggregation {
	pub summaries: BTreeMap<ConversationKey, ConversationSummary>,
	/// Events dropped for missing a user or character ref.
	pub dropped: usize,
}
impl Aggregation {
	/// Summaries of one user in character order. Keys sort by user first, so this is a range
	/// walk starting at the user's smallest possible key.
	pub fn for_user<'a>(
		&'a self,
		user_ref: &'a str,
	) -> impl Iterator<Item = &'a ConversationSummary> + 'a {
		self.summaries
			.range(ConversationKey::new(user_ref, "")..)
			.take_while(move |(key, _)| key.user_ref == user_ref)
			.map(|(_, summary)| summary)
	}
}

/// Folds an unordered event sequence into one summary per conversation.
///
/// The latest event wins `last_sender`; on identical timestamps the first one seen is kept.
pub fn aggregate<'a, I>(events: I) -> Aggregation
where
	I: IntoIterator<Item = &'a ChatEvent>,
{
	let mut out = Aggregation::default();

	for event in events {
		let Some(key) = event.key() else {
			out.dropped += 1;

			continue;
		};

		match out.summaries.get_mut(&key) {
			Some(summary) => {
				if event.timestamp > summary.last_message_time {
					summary.last_message_time = event.timestamp;
					summary.last_sender = event.role;
				}
				if event.is_check_in() {
					summary.has_recent_checkin = true;
				}

				summary.event_count = summary.event_count.saturating_add(1);
			},
			None => {
				out.summaries.insert(
					key.clone(),
					ConversationSummary {
						key,
						last_message_time: event.timestamp,
						last_sender: event.role,
						has_recent_checkin: event.is_check_in(),
						event_count: 1,
					},
				);
			},
		}
	}

	if out.dropped > 0 {
		tracing::debug!(dropped = out.dropped, "Dropped chat events without linking refs.");
	}

	out
}
