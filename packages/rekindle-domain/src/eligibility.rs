use serde::Serialize;
use time::OffsetDateTime;

use crate::{
	activity::{ActivityState, Thresholds, classify, is_due},
	model::{ConversationSummary, UserAccount},
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
	OperatorAccount,
	AlreadySent,
	MissingEmail,
	NotDue,
}
impl Exclusion {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::OperatorAccount => "operator_account",
			Self::AlreadySent => "already_sent",
			Self::MissingEmail => "missing_email",
			Self::NotDue => "not_due",
		}
	}
}

/// Internal and test addresses that never receive re-engagement mail.
#[derive(Clone, Debug, Default)]
pub struct OperatorPolicy {
	domains: Vec<String>,
	addresses: Vec<String>,
}
impl OperatorPolicy {
	pub fn new<D, A>(domains: D, addresses: A) -> Self
	where
		D: IntoIterator,
		D::Item: AsRef<str>,
		A: IntoIterator,
		A::Item: AsRef<str>,
	{
		Self {
			domains: domains
				.into_iter()
				.map(|d| d.as_ref().trim().trim_start_matches('@').to_ascii_lowercase())
				.filter(|d| !d.is_empty())
				.collect(),
			addresses: addresses
				.into_iter()
				.map(|a| a.as_ref().trim().to_ascii_lowercase())
				.filter(|a| !a.is_empty())
				.collect(),
		}
	}

	pub fn is_operator_email(&self, email: &str) -> bool {
		let email = email.trim().to_ascii_lowercase();

		if self.addresses.iter().any(|address| *address == email) {
			return true;
		}

		let Some((_, domain)) = email.rsplit_once('@') else {
			return false;
		};

		self.domains.iter().any(|candidate| candidate == domain)
	}
}
impl From<&rekindle_config::Eligibility> for OperatorPolicy {
	fn from(cfg: &rekindle_config::Eligibility) -> Self {
		Self::new(&cfg.operator_domains, &cfg.operator_addresses)
	}
}

/// A classified conversation paired with its (possibly unresolved) account.
#[derive(Clone, Debug)]
pub struct Candidate<'a> {
	pub summary: &'a ConversationSummary,
	pub account: Option<&'a UserAccount>,
	pub state: ActivityState,
	pub due: bool,
}
impl<'a> Candidate<'a> {
	pub fn evaluate(
		summary: &'a ConversationSummary,
		account: Option<&'a UserAccount>,
		now: OffsetDateTime,
		thresholds: &Thresholds,
	) -> Self {
		Self {
			summary,
			account,
			state: classify(summary, now, thresholds),
			due: is_due(summary, now, thresholds),
		}
	}

	pub fn exclusion(&self, policy: &OperatorPolicy) -> Option<Exclusion> {
		let email = self.account.and_then(UserAccount::deliverable_email);

		if email.is_some_and(|email| policy.is_operator_email(email)) {
			return Some(Exclusion::OperatorAccount);
		}
		if self.state == ActivityState::AlreadySent {
			return Some(Exclusion::AlreadySent);
		}
		if email.is_none() {
			return Some(Exclusion::MissingEmail);
		}
		if !self.due {
			return Some(Exclusion::NotDue);
		}

		None
	}
}

#[derive(Debug)]
pub struct Excluded<'a> {
	pub candidate: Candidate<'a>,
	pub reason: Exclusion,
}

#[derive(Debug, Default)]
pub struct EligibilityOutcome<'a> {
	pub eligible: Vec<Candidate<'a>>,
	pub excluded: Vec<Excluded<'a>>,
}

/// Splits candidates into eligible and excluded, preserving input order on both sides.
pub fn filter_candidates<'a, I>(candidates: I, policy: &OperatorPolicy) -> EligibilityOutcome<'a>
where
	I: IntoIterator<Item = Candidate<'a>>,
{
	let mut outcome = EligibilityOutcome::default();

	for candidate in candidates {
		match candidate.exclusion(policy) {
			Some(reason) => outcome.excluded.push(Excluded { candidate, reason }),
			None => outcome.eligible.push(candidate),
		}
	}

	outcome
}
