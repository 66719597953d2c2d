use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize)]
pub struct OutboundEmail<'a> {
	pub to: &'a str,
	pub subject: &'a str,
	pub html_body: &'a str,
	pub text_body: &'a str,
}

#[derive(Debug, Serialize)]
struct SendBody<'a> {
	from: &'a str,
	to: [&'a str; 1],
	subject: &'a str,
	html: &'a str,
	text: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	reply_to: Option<&'a str>,
}

/// Sends one transactional email and returns the provider's message id when it reports one.
pub async fn send_email(
	cfg: &rekindle_config::Email,
	email: &OutboundEmail<'_>,
) -> Result<Option<String>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = build_body(cfg, email);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();
		let body = body.chars().take(MAX_ERROR_BODY_CHARS).collect();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	let raw = res.text().await?;

	Ok(parse_message_id(&raw))
}

fn build_body<'a>(cfg: &'a rekindle_config::Email, email: &'a OutboundEmail<'a>) -> SendBody<'a> {
	SendBody {
		from: &cfg.from,
		to: [email.to],
		subject: email.subject,
		html: email.html_body,
		text: email.text_body,
		reply_to: cfg.reply_to.as_deref(),
	}
}

fn parse_message_id(raw: &str) -> Option<String> {
	let json: Value = serde_json::from_str(raw).ok()?;

	json.get("id")
		.or_else(|| json.get("message_id"))
		.or_else(|| json.get("MessageID"))
		.and_then(Value::as_str)
		.map(str::to_string)
}
