use toml::Value;

use rekindle_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn validation_message(raw: &str) -> String {
	match rekindle_config::parse(raw) {
		Err(Error::Validation { message }) => message,
		other => panic!("Expected validation error, got {other:?}."),
	}
}

#[test]
fn sample_config_parses_and_normalizes() {
	let cfg =
		rekindle_config::parse(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Sample config must load.");

	assert_eq!(cfg.store.api_base, "https://store.example.net/rest/v1");
	assert_eq!(cfg.dispatch.app_base_url, "https://app.example.net");
	assert_eq!(cfg.eligibility.operator_domains, vec!["internal-test-domain", "example.org"]);
	assert_eq!(cfg.eligibility.operator_addresses, vec!["founder@example.net"]);
	assert!(cfg.email.reply_to.is_none());
	assert!(cfg.security.trigger_token.is_none());
	assert_eq!(cfg.store.columns.message_created_at, "created_at");
	assert_eq!(cfg.store.columns.message_id, "id");
}

#[test]
fn omitted_sections_fall_back_to_defaults() {
	let raw = r#"
[service]
http_bind = "127.0.0.1:8090"

[store]
api_base = "https://store.example.net"
api_key = "k"

[email]
api_base = "https://mail.example.net"
api_key = "k"
from = "hello@example.net"

[dispatch]
app_base_url = "https://app.example.net"
"#;
	let cfg = rekindle_config::parse(raw).expect("Minimal config must load.");

	assert_eq!(cfg.detector.recent_cutoff_hours, 48);
	assert_eq!(cfg.detector.ready_cutoff_hours, 72);
	assert_eq!(cfg.detector.lookback_hours, 168);
	assert_eq!(cfg.batch.default_size, 50);
	assert_eq!(cfg.dispatch.sample_limit, 10);
	assert_eq!(cfg.schedule.interval_minutes, 240);
	assert_eq!(cfg.service.log_level, "info");
	assert_eq!(cfg.email.path, "/emails");
	assert!(cfg.security.bind_localhost_only);
}

#[test]
fn recent_cutoff_must_precede_ready_cutoff() {
	let raw = sample_with("detector", "recent_cutoff_hours", Value::Integer(72));

	assert_eq!(
		validation_message(&raw),
		"detector.recent_cutoff_hours must be less than detector.ready_cutoff_hours."
	);
}

#[test]
fn lookback_must_cover_ready_cutoff() {
	let raw = sample_with("detector", "lookback_hours", Value::Integer(72));

	assert_eq!(
		validation_message(&raw),
		"detector.lookback_hours must be greater than detector.ready_cutoff_hours."
	);
}

#[test]
fn default_batch_cannot_exceed_max() {
	let raw = sample_with("batch", "default_size", Value::Integer(501));

	assert_eq!(validation_message(&raw), "batch.default_size must not exceed batch.max_size.");
}

#[test]
fn blank_api_key_is_rejected() {
	let raw = sample_with("email", "api_key", Value::String(" ".to_string()));

	assert_eq!(validation_message(&raw), "email.api_key must be non-empty.");
}

#[test]
fn operator_domain_with_local_part_is_rejected() {
	let raw = sample_with(
		"eligibility",
		"operator_domains",
		Value::Array(vec![Value::String("qa@internal-test-domain".to_string())]),
	);

	assert!(validation_message(&raw).starts_with("eligibility.operator_domains entry"));
}

#[test]
fn store_base_requires_http_scheme() {
	let raw = sample_with("store", "api_base", Value::String("store.example.net".to_string()));

	assert_eq!(validation_message(&raw), "store.api_base must start with http:// or https://.");
}

#[test]
fn missing_file_reports_path() {
	let path = std::path::Path::new("/definitely/not/here/rekindle.toml");

	match rekindle_config::load(path) {
		Err(Error::Read { path: reported, .. }) => assert_eq!(reported, path),
		other => panic!("Expected read error, got {other:?}."),
	}
}
