//! Batch driver: one window of users, their recent conversations, and the eligibility split.

use time::OffsetDateTime;

use rekindle_domain::{Aggregation, Candidate, UserAccount, aggregate};

use crate::{BatchCursor, BatchProgress, Error, RekindleService, Result};

/// Everything read from the store for one batch. Candidates borrow from here.
pub struct LoadedBatch {
	pub cursor: BatchCursor,
	pub users: Vec<UserAccount>,
	pub total_users: u64,
	pub aggregation: Aggregation,
}
impl LoadedBatch {
	pub fn progress(&self) -> BatchProgress {
		self.cursor.progress(self.users.len(), self.total_users)
	}

	/// Conversations of the batch's users, in user order then character order.
	pub fn candidates<'a>(
		&'a self,
		service: &'a RekindleService,
		now: OffsetDateTime,
	) -> Vec<Candidate<'a>> {
		let mut out = Vec::new();

		for user in &self.users {
			for summary in self.aggregation.for_user(&user.user_ref) {
				out.push(Candidate::evaluate(summary, Some(user), now, service.thresholds()));
			}
		}

		out
	}
}

impl RekindleService {
	/// Fetches exactly one window of users and the events inside the lookback window for them.
	///
	/// Any store failure aborts the whole batch so the caller retries the same cursor.
	pub async fn load_batch(
		&self,
		cursor: BatchCursor,
		now: OffsetDateTime,
	) -> Result<LoadedBatch> {
		let page = self
			.store
			.query_users(cursor.start_offset, cursor.batch_size)
			.await
			.map_err(Error::upstream("query_users"))?;
		let mut users = page.users;

		// A misbehaving store must not widen the batch.
		users.truncate(cursor.batch_size as usize);

		let user_refs: Vec<String> = users.iter().map(|user| user.user_ref.clone()).collect();
		let since = self.lookback_start(now);
		let events = if user_refs.is_empty() {
			Vec::new()
		} else {
			self.store
				.query_chat_events(since, Some(&user_refs))
				.await
				.map_err(Error::upstream("query_chat_events"))?
		};
		let aggregation = aggregate(&events);

		tracing::debug!(
			start = cursor.start_offset,
			batch = cursor.batch_size,
			users = users.len(),
			events = events.len(),
			conversations = aggregation.summaries.len(),
			"Loaded re-engagement batch."
		);

		Ok(LoadedBatch { cursor, users, total_users: page.total, aggregation })
	}
}
