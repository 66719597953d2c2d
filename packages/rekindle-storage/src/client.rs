use std::time::Duration as StdDuration;

use reqwest::{
	Client, RequestBuilder, Response, StatusCode,
	header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use rekindle_config::Store;
use rekindle_domain::{CharacterProfile, ChatEvent, UserAccount};

use crate::{Error, Result, rows};

const PREFER: &str = "prefer";
const MAX_ERROR_BODY_CHARS: usize = 512;
/// User refs per `in.(…)` filter. 100 UUIDs keep a request URL near 4 KiB.
pub const USER_FILTER_CHUNK: usize = 100;

#[derive(Debug)]
pub struct UserPage {
	pub users: Vec<UserAccount>,
	/// Size of the whole user table, not of this page.
	pub total: u64,
}

/// Typed access to the users, characters and messages tables.
#[derive(Clone, Debug)]
pub struct StoreClient {
	http: Client,
	cfg: Store,
}
impl StoreClient {
	pub fn new(cfg: &Store) -> Result<Self> {
		let http = Client::builder()
			.timeout(StdDuration::from_millis(cfg.timeout_ms))
			.default_headers(auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.build()?;

		Ok(Self { http, cfg: cfg.clone() })
	}

	fn table_url(&self, table: &str) -> String {
		format!("{}/{}", self.cfg.api_base, table)
	}

	/// One page of users plus the table total. An offset at or past the end is an empty page,
	/// which PostgREST reports as 416 with `Content-Range: */total`.
	pub async fn query_users(&self, offset: u64, limit: u32) -> Result<UserPage> {
		let columns = &self.cfg.columns;
		let order = format!("{}.asc", columns.user_id);
		let res = self
			.http
			.get(self.table_url(&self.cfg.users_table))
			.header(PREFER, "count=exact")
			.query(&[("select", "*"), ("order", order.as_str())])
			.query(&[("offset", offset), ("limit", u64::from(limit))])
			.send()
			.await?;

		if res.status() == StatusCode::RANGE_NOT_SATISFIABLE {
			return Ok(UserPage { users: Vec::new(), total: content_range_total(&res)? });
		}

		let res = check(res).await?;
		let total = content_range_total(&res)?;
		let body: Value = res.json().await?;
		let users = object_rows(&body)?
			.filter_map(|row| rows::decode_user(row, columns))
			.take(limit as usize)
			.collect();

		Ok(UserPage { users, total })
	}

	/// Every message at or after `since`, restricted to `user_refs` when given.
	///
	/// User refs are sent in chunks of [`USER_FILTER_CHUNK`] to keep the URL bounded.
	pub async fn query_chat_events(
		&self,
		since: OffsetDateTime,
		user_refs: Option<&[String]>,
	) -> Result<Vec<ChatEvent>> {
		let columns = &self.cfg.columns;
		let since = since.format(&Rfc3339).map_err(|err| Error::InvalidResponse {
			message: format!("Failed to format lookback start: {err}."),
		})?;
		let filters = vec![
			("select".to_string(), "*".to_string()),
			(columns.message_created_at.clone(), format!("gte.{since}")),
			(
				"order".to_string(),
				format!("{}.asc,{}.asc", columns.message_created_at, columns.message_id),
			),
		];
		let Some(user_refs) = user_refs else {
			return self.page_events(&filters).await;
		};
		let mut events = Vec::new();

		for chunk in user_refs.chunks(USER_FILTER_CHUNK) {
			let mut chunk_filters = filters.clone();

			chunk_filters.push((columns.message_user.clone(), in_filter(chunk)));
			events.extend(self.page_events(&chunk_filters).await?);
		}

		Ok(events)
	}

	/// Pages through one filtered message query until the store returns a short page.
	async fn page_events(&self, filters: &[(String, String)]) -> Result<Vec<ChatEvent>> {
		let columns = &self.cfg.columns;
		let page_size = u64::from(self.cfg.page_size);
		let mut offset = 0_u64;
		let mut events = Vec::new();
		let mut unreadable = 0_usize;

		loop {
			let req = self
				.http
				.get(self.table_url(&self.cfg.messages_table))
				.query(filters)
				.query(&[("offset", offset), ("limit", page_size)]);
			let body: Value = send(req).await?.json().await?;
			let mut fetched = 0_u64;

			for row in object_rows(&body)? {
				fetched += 1;

				match rows::decode_event(row, columns) {
					Some(event) => events.push(event),
					None => unreadable += 1,
				}
			}

			if fetched < page_size {
				break;
			}

			offset += fetched;
		}

		if unreadable > 0 {
			tracing::debug!(
				unreadable,
				"Skipped message rows without a readable role or timestamp."
			);
		}

		Ok(events)
	}

	pub async fn resolve_user(&self, user_ref: &str) -> Result<Option<UserAccount>> {
		let columns = &self.cfg.columns;
		let row = self.fetch_one(&self.cfg.users_table, &columns.user_id, user_ref).await?;

		Ok(row.as_ref().and_then(|row| rows::decode_user(row, columns)))
	}

	pub async fn resolve_character(
		&self,
		character_ref: &str,
	) -> Result<Option<CharacterProfile>> {
		let columns = &self.cfg.columns;
		let table = &self.cfg.characters_table;
		let row = self.fetch_one(table, &columns.character_id, character_ref).await?;

		Ok(row.as_ref().and_then(|row| rows::decode_character(row, columns)))
	}

	pub async fn record_check_in(
		&self,
		user_ref: &str,
		character_ref: &str,
		timestamp: OffsetDateTime,
	) -> Result<()> {
		let row = rows::encode_check_in(&self.cfg.columns, user_ref, character_ref, timestamp)
			.map_err(|err| Error::InvalidResponse {
				message: format!("Failed to format check-in timestamp: {err}."),
			})?;
		let req = self
			.http
			.post(self.table_url(&self.cfg.messages_table))
			.header(PREFER, "return=minimal")
			.json(&row);

		send(req).await?;

		Ok(())
	}

	async fn fetch_one(
		&self,
		table: &str,
		id_column: &str,
		id: &str,
	) -> Result<Option<Map<String, Value>>> {
		let req = self
			.http
			.get(self.table_url(table))
			.query(&[("select", "*".to_string()), (id_column, format!("eq.{id}"))])
			.query(&[("limit", 1)]);
		let body: Value = send(req).await?.json().await?;

		Ok(object_rows(&body)?.next().cloned())
	}
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(HeaderName::from_static("apikey"), api_key.parse()?);
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

async fn send(req: RequestBuilder) -> Result<Response> {
	check(req.send().await?).await
}

async fn check(res: Response) -> Result<Response> {
	let status = res.status();

	if status.is_success() {
		return Ok(res);
	}

	let body = res.text().await.unwrap_or_default();
	let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();

	Err(Error::Status { status: status.as_u16(), body })
}

fn content_range_total(res: &Response) -> Result<u64> {
	res.headers()
		.get(CONTENT_RANGE)
		.and_then(|value| value.to_str().ok())
		.and_then(parse_content_range_total)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Users response is missing a Content-Range total.".to_string(),
		})
}

fn object_rows(body: &Value) -> Result<impl Iterator<Item = &Map<String, Value>>> {
	let rows = body.as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Store response must be a JSON array.".to_string(),
	})?;

	Ok(rows.iter().filter_map(Value::as_object))
}

/// `in.("a","b")` with embedded quotes and backslashes escaped.
pub fn in_filter(values: &[String]) -> String {
	let quoted: Vec<String> = values
		.iter()
		.map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
		.collect();

	format!("in.({})", quoted.join(","))
}

/// Total from `0-49/120` or `*/0`. An unknown total (`*`) is treated as missing.
pub fn parse_content_range_total(raw: &str) -> Option<u64> {
	let (_, total) = raw.trim().rsplit_once('/')?;

	total.trim().parse().ok()
}
