//! Read-only views of the detector: per-batch status, a window-wide overview, and a rendered
//! preview for one conversation. None of these send or record anything.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use rekindle_domain::{
	ActivityState, Candidate, ConversationKey, Exclusion, Role, aggregate, hours_since, is_due,
	render_message, time_serde,
};

use crate::{BatchCursor, BatchProgress, Error, RekindleService, Result};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStatus {
	pub user_ref: String,
	pub character_ref: String,
	pub state: ActivityState,
	pub last_sender: Role,
	#[serde(with = "time_serde")]
	pub last_message_time: OffsetDateTime,
	pub hours_since: f64,
	pub eligible: bool,
	pub exclusion: Option<Exclusion>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
	#[serde(flatten)]
	pub progress: BatchProgress,
	pub conversations: Vec<ConversationStatus>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
	pub lookback_hours: u32,
	pub conversations: usize,
	/// Every state is present, zero when unused.
	pub states: BTreeMap<&'static str, usize>,
	pub due: usize,
	pub dropped_events: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PreviewRequest {
	pub user: String,
	pub character: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
	pub state: Option<ActivityState>,
	pub eligible: bool,
	pub exclusion: Option<Exclusion>,
	pub subject: String,
	pub text_body: String,
	pub html_body: String,
	pub deep_link: String,
}

impl RekindleService {
	pub async fn status(&self, cursor: BatchCursor, now: OffsetDateTime) -> Result<StatusReport> {
		let batch = self.load_batch(cursor, now).await?;
		let conversations = batch
			.candidates(self, now)
			.into_iter()
			.map(|candidate| {
				let exclusion = candidate.exclusion(self.policy());
				let summary = candidate.summary;

				ConversationStatus {
					user_ref: summary.key.user_ref.clone(),
					character_ref: summary.key.character_ref.clone(),
					state: candidate.state,
					last_sender: summary.last_sender,
					last_message_time: summary.last_message_time,
					hours_since: hours_since(summary.last_message_time, now),
					eligible: exclusion.is_none(),
					exclusion,
				}
			})
			.collect();

		Ok(StatusReport { progress: batch.progress(), conversations })
	}

	/// Counts conversations per state over the whole lookback window, across all users.
	pub async fn overview(&self, now: OffsetDateTime) -> Result<OverviewReport> {
		let events = self
			.store
			.query_chat_events(self.lookback_start(now), None)
			.await
			.map_err(Error::upstream("query_chat_events"))?;
		let aggregation = aggregate(&events);
		let mut states: BTreeMap<&'static str, usize> =
			ActivityState::ALL.iter().map(|state| (state.as_str(), 0)).collect();
		let mut due = 0;

		for summary in aggregation.summaries.values() {
			let state = rekindle_domain::classify(summary, now, self.thresholds());

			*states.entry(state.as_str()).or_default() += 1;

			if is_due(summary, now, self.thresholds()) {
				due += 1;
			}
		}

		Ok(OverviewReport {
			lookback_hours: self.cfg.detector.lookback_hours,
			conversations: aggregation.summaries.len(),
			states,
			due,
			dropped_events: aggregation.dropped,
		})
	}

	/// Renders the email one conversation would receive, with its current classification.
	pub async fn preview(
		&self,
		request: &PreviewRequest,
		now: OffsetDateTime,
	) -> Result<PreviewReport> {
		let user_ref = request.user.trim();
		let character_ref = request.character.trim();

		if user_ref.is_empty() || character_ref.is_empty() {
			return Err(Error::InvalidRequest {
				message: "user and character must be non-empty.".to_string(),
			});
		}

		let account = self
			.store
			.resolve_user(user_ref)
			.await
			.map_err(Error::upstream("resolve_user"))?
			.ok_or_else(|| Error::NotFound { message: format!("user {user_ref}") })?;
		let character = self
			.store
			.resolve_character(character_ref)
			.await
			.map_err(Error::upstream("resolve_character"))?
			.ok_or_else(|| Error::NotFound { message: format!("character {character_ref}") })?;
		let user_refs = [account.user_ref.clone()];
		let events = self
			.store
			.query_chat_events(self.lookback_start(now), Some(&user_refs))
			.await
			.map_err(Error::upstream("query_chat_events"))?;
		let aggregation = aggregate(&events);
		let key = ConversationKey::new(account.user_ref.as_str(), character.character_ref.as_str());
		let candidate = aggregation
			.summaries
			.get(&key)
			.map(|summary| Candidate::evaluate(summary, Some(&account), now, self.thresholds()));
		let exclusion = match &candidate {
			Some(candidate) => candidate.exclusion(self.policy()),
			None => Some(Exclusion::NotDue),
		};
		let message = render_message(&self.cfg.dispatch.app_base_url, &account, &character);

		Ok(PreviewReport {
			state: candidate.as_ref().map(|candidate| candidate.state),
			eligible: exclusion.is_none(),
			exclusion,
			subject: message.subject,
			text_body: message.text_body,
			html_body: message.html_body,
			deep_link: message.deep_link,
		})
	}
}
