//! Row decoding for the users, characters and messages tables.

use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use rekindle_config::StoreColumns;
use rekindle_domain::{CharacterProfile, ChatEvent, MessageType, Role, UserAccount};

/// Ids come back as strings or numbers depending on the column type.
pub fn id_value(row: &Map<String, Value>, column: &str) -> Option<String> {
	match row.get(column)? {
		Value::String(raw) => {
			let trimmed = raw.trim();

			if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
		},
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

fn text_value(row: &Map<String, Value>, column: &str) -> Option<String> {
	row.get(column).and_then(Value::as_str).map(str::to_string)
}

pub fn parse_role(raw: &str) -> Option<Role> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"user" | "human" => Some(Role::User),
		"assistant" | "ai" | "character" => Some(Role::Assistant),
		_ => None,
	}
}

pub fn parse_message_type(raw: Option<&str>) -> MessageType {
	match raw.map(|value| value.trim().to_ascii_lowercase()) {
		Some(value) if matches!(value.as_str(), "check_in" | "checkin" | "check-in") =>
			MessageType::CheckIn,
		_ => MessageType::Normal,
	}
}

/// Returns `None` for rows whose role or timestamp cannot be read. Missing linking refs are kept
/// as `None` so the aggregator can account for them.
pub fn decode_event(row: &Map<String, Value>, columns: &StoreColumns) -> Option<ChatEvent> {
	let role = row.get(&columns.message_role).and_then(Value::as_str).and_then(parse_role)?;
	let timestamp = row
		.get(&columns.message_created_at)
		.and_then(Value::as_str)
		.and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())?;

	Some(ChatEvent {
		user_ref: id_value(row, &columns.message_user),
		character_ref: id_value(row, &columns.message_character),
		role,
		timestamp,
		message_type: parse_message_type(
			row.get(&columns.message_type).and_then(Value::as_str),
		),
		text: text_value(row, &columns.message_text).unwrap_or_default(),
	})
}

pub fn decode_user(row: &Map<String, Value>, columns: &StoreColumns) -> Option<UserAccount> {
	Some(UserAccount {
		user_ref: id_value(row, &columns.user_id)?,
		email: text_value(row, &columns.user_email),
		display_name: text_value(row, &columns.user_display_name),
	})
}

pub fn decode_character(
	row: &Map<String, Value>,
	columns: &StoreColumns,
) -> Option<CharacterProfile> {
	let character_ref = id_value(row, &columns.character_id)?;
	let name = text_value(row, &columns.character_name)
		.filter(|name| !name.trim().is_empty())
		.unwrap_or_else(|| "Your companion".to_string());
	let slug = text_value(row, &columns.character_slug)
		.filter(|slug| !slug.trim().is_empty())
		.unwrap_or_else(|| character_ref.clone());

	Some(CharacterProfile { character_ref, name, slug })
}

pub fn encode_check_in(
	columns: &StoreColumns,
	user_ref: &str,
	character_ref: &str,
	timestamp: OffsetDateTime,
) -> Result<Value, time::error::Format> {
	let mut row = Map::new();

	row.insert(columns.message_user.clone(), Value::String(user_ref.to_string()));
	row.insert(columns.message_character.clone(), Value::String(character_ref.to_string()));
	row.insert(columns.message_role.clone(), Value::String(Role::Assistant.as_str().to_string()));
	row.insert(
		columns.message_type.clone(),
		Value::String(MessageType::CheckIn.as_str().to_string()),
	);
	row.insert(columns.message_text.clone(), Value::String(String::new()));
	row.insert(columns.message_created_at.clone(), Value::String(timestamp.format(&Rfc3339)?));

	Ok(Value::Object(row))
}
