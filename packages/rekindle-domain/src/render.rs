//! Re-engagement email content.

use crate::model::{CharacterProfile, UserAccount};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReEngagementMessage {
	pub subject: String,
	pub html_body: String,
	pub text_body: String,
	pub deep_link: String,
}

pub fn render_message(
	app_base_url: &str,
	account: &UserAccount,
	character: &CharacterProfile,
) -> ReEngagementMessage {
	let deep_link = deep_link(app_base_url, &character.slug);
	let greeting_name = account
		.display_name
		.as_deref()
		.map(str::trim)
		.filter(|name| !name.is_empty())
		.unwrap_or("there");
	let character_name = character.name.trim();
	let subject = format!("{character_name} sent you a message");
	let text_body = format!(
		"Hi {greeting_name},\n\n\
		{character_name} left you a message and is waiting to hear back.\n\n\
		Continue the conversation: {deep_link}\n"
	);
	let html_body = format!(
		"<p>Hi {name},</p>\
		<p><strong>{character}</strong> left you a message and is waiting to hear back.</p>\
		<p><a href=\"{link}\">Continue the conversation</a></p>",
		name = escape_html(greeting_name),
		character = escape_html(character_name),
		link = escape_html(&deep_link),
	);

	ReEngagementMessage { subject, html_body, text_body, deep_link }
}

fn deep_link(app_base_url: &str, slug: &str) -> String {
	let base = app_base_url.trim_end_matches('/');
	let slug: String = slug
		.trim()
		.chars()
		.filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
		.collect();

	format!("{base}/chat/{slug}")
}

fn escape_html(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}

	out
}

/// Keeps the first character of the local part and the domain: `j***@example.com`.
pub fn mask_email(email: &str) -> String {
	let email = email.trim();
	let Some((local, domain)) = email.rsplit_once('@') else {
		return "***".to_string();
	};
	let first = local.chars().next().map(String::from).unwrap_or_default();

	format!("{first}***@{domain}")
}
