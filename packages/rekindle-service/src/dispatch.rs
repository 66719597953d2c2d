use std::collections::HashMap;

use serde::Serialize;
use time::OffsetDateTime;

use rekindle_domain::{
	Candidate, CharacterProfile, ConversationKey, filter_candidates, mask_email, render_message,
};
use rekindle_providers::{SendFailure, email::OutboundEmail};

use crate::{BatchCursor, BatchProgress, Error, RekindleService, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
	pub sent: u32,
	pub skipped: u32,
	pub failed: u32,
	/// Emails that went out but whose check-in marker could not be written.
	pub marker_failures: u32,
	pub sample_recipients: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
	#[serde(flatten)]
	pub progress: BatchProgress,
	#[serde(flatten)]
	pub dispatch: DispatchReport,
}

enum Outcome {
	Sent { recipient: String, marker_written: bool },
	Failed { failure: Option<SendFailure> },
}

impl RekindleService {
	/// Runs one batch: load, classify, filter, then send and record a check-in per eligible
	/// conversation. Overlapping calls on the same service are refused.
	pub async fn send_batch(&self, cursor: BatchCursor, now: OffsetDateTime) -> Result<SendReport> {
		let Ok(_guard) = self.sweep_lock.try_lock() else {
			return Err(Error::SweepInProgress);
		};
		let batch = self.load_batch(cursor, now).await?;
		let progress = batch.progress();
		let outcome = filter_candidates(batch.candidates(self, now), self.policy());
		let mut report = self.dispatch(&outcome.eligible, now).await?;

		report.skipped = u32::try_from(outcome.excluded.len()).unwrap_or(u32::MAX);

		tracing::info!(
			start = progress.start,
			end = progress.end,
			total_users = progress.total_users,
			sent = report.sent,
			skipped = report.skipped,
			failed = report.failed,
			marker_failures = report.marker_failures,
			has_more = progress.has_more,
			"Re-engagement batch finished."
		);

		Ok(SendReport { progress, dispatch: report })
	}

	/// Sends to each eligible conversation in order. Individual failures are counted and the
	/// loop continues; only a run of provider outages stops it.
	pub async fn dispatch(
		&self,
		eligible: &[Candidate<'_>],
		now: OffsetDateTime,
	) -> Result<DispatchReport> {
		let sample_limit = self.cfg.dispatch.sample_limit as usize;
		let max_unavailable = self.cfg.dispatch.max_consecutive_unavailable;
		let mut characters: HashMap<String, Option<CharacterProfile>> = HashMap::new();
		let mut report = DispatchReport::default();
		let mut consecutive_unavailable = 0_u32;

		for candidate in eligible {
			match self.dispatch_one(candidate, &mut characters, now).await {
				Outcome::Sent { recipient, marker_written } => {
					consecutive_unavailable = 0;
					report.sent += 1;

					if !marker_written {
						report.marker_failures += 1;
					}
					if report.sample_recipients.len() < sample_limit {
						report.sample_recipients.push(mask_email(&recipient));
					}
				},
				Outcome::Failed { failure } => {
					report.failed += 1;

					if failure == Some(SendFailure::Unavailable) {
						consecutive_unavailable += 1;
					} else {
						consecutive_unavailable = 0;
					}
					if max_unavailable > 0 && consecutive_unavailable >= max_unavailable {
						return Err(Error::UpstreamUnavailable {
							stage: "send_email",
							message: format!(
								"{consecutive_unavailable} consecutive sends failed; {} sent \
								 before stopping.",
								report.sent
							),
						});
					}
				},
			}
		}

		Ok(report)
	}

	async fn dispatch_one(
		&self,
		candidate: &Candidate<'_>,
		characters: &mut HashMap<String, Option<CharacterProfile>>,
		now: OffsetDateTime,
	) -> Outcome {
		let key = &candidate.summary.key;
		let Some(account) = candidate.account else {
			tracing::warn!(
				conversation = %key,
				stage = "resolve_user",
				"Eligible conversation has no account."
			);

			return Outcome::Failed { failure: None };
		};
		let Some(recipient) = account.deliverable_email() else {
			tracing::warn!(
				conversation = %key,
				stage = "resolve_user",
				"Eligible conversation has no email."
			);

			return Outcome::Failed { failure: None };
		};
		let character = match self.character(key, characters).await {
			Some(character) => character,
			None => return Outcome::Failed { failure: None },
		};
		let message = render_message(&self.cfg.dispatch.app_base_url, account, &character);
		let email = OutboundEmail {
			to: recipient,
			subject: &message.subject,
			html_body: &message.html_body,
			text_body: &message.text_body,
		};

		if let Err(err) = self.mailer.send(&self.cfg.email, &email).await {
			let failure = err.failure();

			tracing::warn!(
				conversation = %key,
				stage = "send_email",
				error = %err,
				failure = ?failure,
				"Re-engagement email failed."
			);

			return Outcome::Failed { failure: Some(failure) };
		}

		let marker_written = match self
			.store
			.record_check_in(&key.user_ref, &key.character_ref, now)
			.await
		{
			Ok(()) => true,
			Err(err) => {
				tracing::error!(
					conversation = %key,
					stage = "record_check_in",
					error = %err,
					"Email sent but check-in marker was not recorded."
				);

				false
			},
		};

		Outcome::Sent { recipient: recipient.to_string(), marker_written }
	}

	/// Per-batch character cache. Lookup errors are not cached so a later conversation with the
	/// same character tries again.
	async fn character(
		&self,
		key: &ConversationKey,
		cache: &mut HashMap<String, Option<CharacterProfile>>,
	) -> Option<CharacterProfile> {
		let found = match cache.get(&key.character_ref) {
			Some(cached) => cached.clone(),
			None => match self.store.resolve_character(&key.character_ref).await {
				Ok(found) => {
					cache.insert(key.character_ref.clone(), found.clone());

					found
				},
				Err(err) => {
					tracing::warn!(
						conversation = %key,
						stage = "resolve_character",
						error = %err,
						"Character lookup failed."
					);

					return None;
				},
			},
		};

		if found.is_none() {
			tracing::warn!(
				conversation = %key,
				stage = "resolve_character",
				"Character not found."
			);
		}

		found
	}
}
