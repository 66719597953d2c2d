//! Scheduled sweep: walks every user batch by batch, then sleeps until the next tick.

use std::time::Duration as StdDuration;

use color_eyre::Result;
use time::OffsetDateTime;
use tokio::time as tokio_time;

use rekindle_service::{BatchCursor, RekindleService};

use crate::Error;

pub struct WorkerState {
	pub service: RekindleService,
	/// Offset a failed scan stopped at. The next tick resumes here instead of from zero.
	pub resume_offset: u64,
}
impl WorkerState {
	pub fn new(service: RekindleService) -> Self {
		Self { service, resume_offset: 0 }
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
	pub batches: u32,
	pub users: u64,
	pub sent: u32,
	pub skipped: u32,
	pub failed: u32,
	pub marker_failures: u32,
}

pub async fn run_worker(mut state: WorkerState) -> Result<()> {
	let interval_minutes = state.service.cfg.schedule.interval_minutes;
	let interval = minutes(interval_minutes);

	tracing::info!(interval_minutes, "Worker started.");

	loop {
		match scan(&mut state).await {
			Ok(summary) => tracing::info!(
				batches = summary.batches,
				users = summary.users,
				sent = summary.sent,
				skipped = summary.skipped,
				failed = summary.failed,
				marker_failures = summary.marker_failures,
				"Scan finished."
			),
			Err(err) => tracing::error!(
				error = %err,
				resume_offset = state.resume_offset,
				"Scan failed. Retrying from the same offset on the next tick."
			),
		}

		tokio::select! {
			_ = tokio_time::sleep(interval) => {},
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Shutdown requested.");

				return Ok(());
			},
		}
	}
}

/// Runs batches from `state.resume_offset` until the store reports no more users.
///
/// A failing batch leaves `resume_offset` at that batch's start and returns the error.
pub async fn scan(state: &mut WorkerState) -> crate::Result<ScanSummary> {
	let batch_size = state.service.cfg.batch.default_size;
	let pause = StdDuration::from_millis(state.service.cfg.schedule.batch_pause_ms);
	let mut summary = ScanSummary::default();

	loop {
		let cursor = BatchCursor { start_offset: state.resume_offset, batch_size };
		let report = state
			.service
			.send_batch(cursor, OffsetDateTime::now_utc())
			.await
			.map_err(|source| Error::Batch { offset: cursor.start_offset, source })?;

		summary.batches += 1;
		summary.users += report.progress.end.saturating_sub(report.progress.start);
		summary.sent += report.dispatch.sent;
		summary.skipped += report.dispatch.skipped;
		summary.failed += report.dispatch.failed;
		summary.marker_failures += report.dispatch.marker_failures;

		let Some(next) = report.progress.next_batch else {
			state.resume_offset = 0;

			return Ok(summary);
		};

		state.resume_offset = next;

		if !pause.is_zero() {
			tokio_time::sleep(pause).await;
		}
	}
}

fn minutes(value: u64) -> StdDuration {
	StdDuration::from_secs(value.max(1).saturating_mul(60))
}
