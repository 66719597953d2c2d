use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
	#[default]
	Normal,
	CheckIn,
}
impl MessageType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Normal => "normal",
			Self::CheckIn => "check_in",
		}
	}
}

/// One message turn as read from the store.
///
/// The linking refs are optional because upstream rows are not guaranteed to carry them; the
/// aggregator drops events where either is missing.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ChatEvent {
	pub user_ref: Option<String>,
	pub character_ref: Option<String>,
	pub role: Role,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	#[serde(default)]
	pub message_type: MessageType,
	#[serde(default)]
	pub text: String,
}
impl ChatEvent {
	pub fn key(&self) -> Option<ConversationKey> {
		let user_ref = self.user_ref.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
		let character_ref =
			self.character_ref.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

		Some(ConversationKey::new(user_ref, character_ref))
	}

	pub fn is_check_in(&self) -> bool {
		self.message_type == MessageType::CheckIn
	}
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ConversationKey {
	pub user_ref: String,
	pub character_ref: String,
}
impl ConversationKey {
	pub fn new(user_ref: impl Into<String>, character_ref: impl Into<String>) -> Self {
		Self { user_ref: user_ref.into(), character_ref: character_ref.into() }
	}
}
impl std::fmt::Display for ConversationKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.user_ref, self.character_ref)
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationSummary {
	pub key: ConversationKey,
	#[serde(with = "crate::time_serde")]
	pub last_message_time: OffsetDateTime,
	pub last_sender: Role,
	pub has_recent_checkin: bool,
	pub event_count: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct UserAccount {
	pub user_ref: String,
	pub email: Option<String>,
	pub display_name: Option<String>,
}
impl UserAccount {
	/// Trimmed, non-empty email.
	pub fn deliverable_email(&self) -> Option<&str> {
		self.email.as_deref().map(str::trim).filter(|email| !email.is_empty())
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CharacterProfile {
	pub character_ref: String,
	pub name: String,
	pub slug: String,
}
