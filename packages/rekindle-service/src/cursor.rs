use serde::{Deserialize, Serialize};

/// Query parameters of a trigger: `start` is the user offset, `batch` the number of users.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct BatchRequest {
	pub start: Option<u64>,
	pub batch: Option<u32>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchCursor {
	pub start_offset: u64,
	pub batch_size: u32,
}
impl BatchCursor {
	/// Missing size uses the default; oversized and zero sizes are clamped into `1..=max_size`.
	pub fn resolve(request: BatchRequest, cfg: &rekindle_config::Batch) -> Self {
		let batch_size = request.batch.unwrap_or(cfg.default_size).clamp(1, cfg.max_size.max(1));

		Self { start_offset: request.start.unwrap_or(0), batch_size }
	}

	pub fn progress(&self, fetched: usize, total_users: u64) -> BatchProgress {
		let end = self.start_offset + fetched as u64;
		let window_end = self.start_offset.saturating_add(u64::from(self.batch_size));
		let has_more = window_end < total_users;

		BatchProgress {
			start: self.start_offset,
			end,
			total_users,
			has_more,
			next_batch: has_more.then_some(window_end),
		}
	}
}

/// Where this invocation stopped and where the next one should resume.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
	pub start: u64,
	pub end: u64,
	pub total_users: u64,
	pub has_more: bool,
	pub next_batch: Option<u64>,
}
