use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub store: Store,
	pub email: Email,
	#[serde(default)]
	pub detector: Detector,
	#[serde(default)]
	pub eligibility: Eligibility,
	#[serde(default)]
	pub batch: Batch,
	pub dispatch: Dispatch,
	#[serde(default)]
	pub schedule: Schedule,
	#[serde(default)]
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

/// Hosted table store exposing a PostgREST-style REST surface.
#[derive(Debug, Clone, Deserialize)]
pub struct Store {
	pub api_base: String,
	pub api_key: String,
	#[serde(default = "default_users_table")]
	pub users_table: String,
	#[serde(default = "default_characters_table")]
	pub characters_table: String,
	#[serde(default = "default_messages_table")]
	pub messages_table: String,
	#[serde(default = "default_page_size")]
	pub page_size: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	#[serde(default)]
	pub columns: StoreColumns,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreColumns {
	pub user_id: String,
	pub user_email: String,
	pub user_display_name: String,
	pub character_id: String,
	pub character_name: String,
	pub character_slug: String,
	/// Unique message key, used to break `created_at` ties so paging is stable.
	pub message_id: String,
	pub message_user: String,
	pub message_character: String,
	pub message_role: String,
	pub message_type: String,
	pub message_text: String,
	pub message_created_at: String,
}
impl Default for StoreColumns {
	fn default() -> Self {
		Self {
			user_id: "id".to_string(),
			user_email: "email".to_string(),
			user_display_name: "display_name".to_string(),
			character_id: "id".to_string(),
			character_name: "name".to_string(),
			character_slug: "slug".to_string(),
			message_id: "id".to_string(),
			message_user: "user_id".to_string(),
			message_character: "character_id".to_string(),
			message_role: "role".to_string(),
			message_type: "message_type".to_string(),
			message_text: "content".to_string(),
			message_created_at: "created_at".to_string(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Email {
	pub api_base: String,
	#[serde(default = "default_email_path")]
	pub path: String,
	pub api_key: String,
	pub from: String,
	pub reply_to: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Detector {
	/// Events older than this are never fetched; also bounds how long a check-in suppresses
	/// another send.
	pub lookback_hours: u32,
	pub recent_cutoff_hours: u32,
	pub ready_cutoff_hours: u32,
}
impl Default for Detector {
	fn default() -> Self {
		Self { lookback_hours: 168, recent_cutoff_hours: 48, ready_cutoff_hours: 72 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Eligibility {
	/// Domains such as "example.com". Subdomains are not matched.
	pub operator_domains: Vec<String>,
	pub operator_addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Batch {
	pub default_size: u32,
	pub max_size: u32,
}
impl Default for Batch {
	fn default() -> Self {
		Self { default_size: 50, max_size: 500 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dispatch {
	pub app_base_url: String,
	#[serde(default = "default_sample_limit")]
	pub sample_limit: u32,
	/// Zero disables the early stop.
	#[serde(default = "default_max_consecutive_unavailable")]
	pub max_consecutive_unavailable: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Schedule {
	pub interval_minutes: u64,
	pub batch_pause_ms: u64,
}
impl Default for Schedule {
	fn default() -> Self {
		Self { interval_minutes: 240, batch_pause_ms: 1_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub trigger_token: Option<String>,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: true, trigger_token: None }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_users_table() -> String {
	"users".to_string()
}

fn default_characters_table() -> String {
	"characters".to_string()
}

fn default_messages_table() -> String {
	"chat_messages".to_string()
}

fn default_page_size() -> u32 {
	1_000
}

fn default_timeout_ms() -> u64 {
	10_000
}

fn default_email_path() -> String {
	"/emails".to_string()
}

fn default_sample_limit() -> u32 {
	10
}

fn default_max_consecutive_unavailable() -> u32 {
	3
}
