//! In-memory collaborators and config fixtures for exercising the detector without a store or an
//! email provider.

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicBool, Ordering},
	},
};

use serde_json::Map;
use time::{Duration, OffsetDateTime};

use rekindle_config::{
	Batch, Config, Detector, Dispatch, Eligibility, Email, Schedule, Security, Service, Store,
	StoreColumns,
};
use rekindle_domain::{CharacterProfile, ChatEvent, MessageType, Role, UserAccount};
use rekindle_providers::email::OutboundEmail;
use rekindle_service::{BoxFuture, Mailer, MessageStore};
use rekindle_storage::UserPage;

pub const OPERATOR_DOMAIN: &str = "internal-test-domain";

pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		store: Store {
			api_base: "http://127.0.0.1:1".to_string(),
			api_key: "store-key".to_string(),
			users_table: "users".to_string(),
			characters_table: "characters".to_string(),
			messages_table: "chat_messages".to_string(),
			page_size: 100,
			timeout_ms: 1_000,
			default_headers: Map::new(),
			columns: StoreColumns::default(),
		},
		email: Email {
			api_base: "http://127.0.0.1:1".to_string(),
			path: "/emails".to_string(),
			api_key: "mail-key".to_string(),
			from: "hello@example.net".to_string(),
			reply_to: None,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		},
		detector: Detector::default(),
		eligibility: Eligibility {
			operator_domains: vec![OPERATOR_DOMAIN.to_string()],
			operator_addresses: Vec::new(),
		},
		batch: Batch::default(),
		dispatch: Dispatch {
			app_base_url: "https://app.example.net".to_string(),
			sample_limit: 10,
			max_consecutive_unavailable: 3,
		},
		schedule: Schedule::default(),
		security: Security::default(),
	}
}

pub fn user(user_ref: &str, email: Option<&str>) -> UserAccount {
	UserAccount {
		user_ref: user_ref.to_string(),
		email: email.map(str::to_string),
		display_name: Some(format!("User {user_ref}")),
	}
}

pub fn character(character_ref: &str, name: &str) -> CharacterProfile {
	CharacterProfile {
		character_ref: character_ref.to_string(),
		name: name.to_string(),
		slug: name.to_ascii_lowercase(),
	}
}

pub fn message(
	user_ref: &str,
	character_ref: &str,
	role: Role,
	at: OffsetDateTime,
	hours_ago: i64,
) -> ChatEvent {
	ChatEvent {
		user_ref: Some(user_ref.to_string()),
		character_ref: Some(character_ref.to_string()),
		role,
		timestamp: at - Duration::hours(hours_ago),
		message_type: MessageType::Normal,
		text: "hello".to_string(),
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

fn unavailable(what: &str) -> rekindle_storage::Error {
	rekindle_storage::Error::Status { status: 503, body: format!("{what} unavailable") }
}

/// Store backed by vectors. Users are served in insertion order.
#[derive(Default)]
pub struct MemoryStore {
	users: Mutex<Vec<UserAccount>>,
	characters: Mutex<HashMap<String, CharacterProfile>>,
	events: Mutex<Vec<ChatEvent>>,
	user_queries: Mutex<Vec<(u64, u32)>>,
	pub fail_query_users: AtomicBool,
	pub fail_query_events: AtomicBool,
	pub fail_record_check_in: AtomicBool,
	pub fail_resolve_character: AtomicBool,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_users(self, users: impl IntoIterator<Item = UserAccount>) -> Self {
		lock(&self.users).extend(users);

		self
	}

	pub fn with_characters(self, characters: impl IntoIterator<Item = CharacterProfile>) -> Self {
		lock(&self.characters)
			.extend(characters.into_iter().map(|c| (c.character_ref.clone(), c)));

		self
	}

	pub fn with_events(self, events: impl IntoIterator<Item = ChatEvent>) -> Self {
		lock(&self.events).extend(events);

		self
	}

	pub fn push_event(&self, event: ChatEvent) {
		lock(&self.events).push(event);
	}

	pub fn events(&self) -> Vec<ChatEvent> {
		lock(&self.events).clone()
	}

	pub fn check_ins(&self) -> Vec<ChatEvent> {
		lock(&self.events).iter().filter(|event| event.is_check_in()).cloned().collect()
	}

	/// `(offset, limit)` of every users query, in call order.
	pub fn user_queries(&self) -> Vec<(u64, u32)> {
		lock(&self.user_queries).clone()
	}

	pub fn set(&self, flag: &AtomicBool, value: bool) {
		flag.store(value, Ordering::SeqCst);
	}
}
impl MessageStore for MemoryStore {
	fn query_users<'a>(
		&'a self,
		offset: u64,
		limit: u32,
	) -> BoxFuture<'a, rekindle_storage::Result<UserPage>> {
		lock(&self.user_queries).push((offset, limit));

		let result = if self.fail_query_users.load(Ordering::SeqCst) {
			Err(unavailable("users"))
		} else {
			let users = lock(&self.users);
			let page = users
				.iter()
				.skip(usize::try_from(offset).unwrap_or(usize::MAX))
				.take(limit as usize)
				.cloned()
				.collect();

			Ok(UserPage { users: page, total: users.len() as u64 })
		};

		Box::pin(async move { result })
	}

	fn query_chat_events<'a>(
		&'a self,
		since: OffsetDateTime,
		user_refs: Option<&'a [String]>,
	) -> BoxFuture<'a, rekindle_storage::Result<Vec<ChatEvent>>> {
		let result = if self.fail_query_events.load(Ordering::SeqCst) {
			Err(unavailable("messages"))
		} else {
			let wanted: Option<HashSet<&str>> =
				user_refs.map(|refs| refs.iter().map(String::as_str).collect());

			Ok(lock(&self.events)
				.iter()
				.filter(|event| event.timestamp >= since)
				.filter(|event| match (&wanted, event.user_ref.as_deref()) {
					(None, _) => true,
					(Some(wanted), Some(user_ref)) => wanted.contains(user_ref),
					(Some(_), None) => false,
				})
				.cloned()
				.collect())
		};

		Box::pin(async move { result })
	}

	fn resolve_user<'a>(
		&'a self,
		user_ref: &'a str,
	) -> BoxFuture<'a, rekindle_storage::Result<Option<UserAccount>>> {
		let found = lock(&self.users).iter().find(|user| user.user_ref == user_ref).cloned();

		Box::pin(async move { Ok(found) })
	}

	fn resolve_character<'a>(
		&'a self,
		character_ref: &'a str,
	) -> BoxFuture<'a, rekindle_storage::Result<Option<CharacterProfile>>> {
		let result = if self.fail_resolve_character.load(Ordering::SeqCst) {
			Err(unavailable("characters"))
		} else {
			Ok(lock(&self.characters).get(character_ref).cloned())
		};

		Box::pin(async move { result })
	}

	fn record_check_in<'a>(
		&'a self,
		user_ref: &'a str,
		character_ref: &'a str,
		timestamp: OffsetDateTime,
	) -> BoxFuture<'a, rekindle_storage::Result<()>> {
		let result = if self.fail_record_check_in.load(Ordering::SeqCst) {
			Err(unavailable("messages"))
		} else {
			self.push_event(ChatEvent {
				user_ref: Some(user_ref.to_string()),
				character_ref: Some(character_ref.to_string()),
				role: Role::Assistant,
				timestamp,
				message_type: MessageType::CheckIn,
				text: String::new(),
			});

			Ok(())
		};

		Box::pin(async move { result })
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentEmail {
	pub to: String,
	pub subject: String,
	pub text_body: String,
}

/// Mailer that records every accepted message. Recipients listed in `rejecting` get a 422 and
/// those in `unavailable_for` a 503; `down` fails every send with a 503.
#[derive(Default)]
pub struct RecordingMailer {
	sent: Mutex<Vec<SentEmail>>,
	rejecting: Mutex<HashSet<String>>,
	unavailable_for: Mutex<HashSet<String>>,
	pub down: AtomicBool,
}
impl RecordingMailer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reject(&self, recipient: &str) {
		lock(&self.rejecting).insert(recipient.to_string());
	}

	pub fn fail_unavailable(&self, recipient: &str) {
		lock(&self.unavailable_for).insert(recipient.to_string());
	}

	pub fn set_down(&self, down: bool) {
		self.down.store(down, Ordering::SeqCst);
	}

	pub fn sent(&self) -> Vec<SentEmail> {
		lock(&self.sent).clone()
	}
}
impl Mailer for RecordingMailer {
	fn send<'a>(
		&'a self,
		_cfg: &'a Email,
		email: &'a OutboundEmail<'a>,
	) -> BoxFuture<'a, rekindle_providers::Result<Option<String>>> {
		let status = if self.down.load(Ordering::SeqCst)
			|| lock(&self.unavailable_for).contains(email.to)
		{
			Some(503)
		} else if lock(&self.rejecting).contains(email.to) {
			Some(422)
		} else {
			None
		};
		let result = match status {
			Some(status) =>
				Err(rekindle_providers::Error::Status { status, body: "refused".to_string() }),
			None => {
				let mut sent = lock(&self.sent);

				sent.push(SentEmail {
					to: email.to.to_string(),
					subject: email.subject.to_string(),
					text_body: email.text_body.to_string(),
				});

				Ok(Some(format!("msg_{}", sent.len())))
			},
		};

		Box::pin(async move { result })
	}
}
