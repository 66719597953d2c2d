mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Batch, Config, Detector, Dispatch, Eligibility, Email, Schedule, Security, Service, Store,
	StoreColumns,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::Read { path: path.to_path_buf(), source: err })?;
	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::Parse { path: path.to_path_buf(), source: err })?;

	finish(cfg)
}

pub fn parse(raw: &str) -> Result<Config> {
	let cfg: Config = toml::from_str(raw).map_err(|err| Error::ParseInline { source: err })?;

	finish(cfg)
}

fn finish(mut cfg: Config) -> Result<Config> {
	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(validation("service.http_bind must be non-empty."));
	}

	for (label, base) in [
		("store.api_base", &cfg.store.api_base),
		("email.api_base", &cfg.email.api_base),
		("dispatch.app_base_url", &cfg.dispatch.app_base_url),
	] {
		if !(base.starts_with("http://") || base.starts_with("https://")) {
			return Err(Error::Validation {
				message: format!("{label} must start with http:// or https://."),
			});
		}
	}
	for (label, key) in [("store", &cfg.store.api_key), ("email", &cfg.email.api_key)] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("{label}.api_key must be non-empty."),
			});
		}
	}
	for (label, table) in [
		("store.users_table", &cfg.store.users_table),
		("store.characters_table", &cfg.store.characters_table),
		("store.messages_table", &cfg.store.messages_table),
	] {
		if table.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.store.page_size == 0 {
		return Err(validation("store.page_size must be greater than zero."));
	}
	if cfg.email.from.trim().is_empty() {
		return Err(validation("email.from must be non-empty."));
	}
	if !cfg.email.path.starts_with('/') {
		return Err(validation("email.path must start with '/'."));
	}
	if cfg.detector.recent_cutoff_hours == 0 {
		return Err(validation("detector.recent_cutoff_hours must be greater than zero."));
	}
	if cfg.detector.recent_cutoff_hours >= cfg.detector.ready_cutoff_hours {
		return Err(validation(
			"detector.recent_cutoff_hours must be less than detector.ready_cutoff_hours.",
		));
	}
	// Conversations have to stay visible past the ready cutoff or nothing is ever due.
	if cfg.detector.lookback_hours <= cfg.detector.ready_cutoff_hours {
		return Err(validation(
			"detector.lookback_hours must be greater than detector.ready_cutoff_hours.",
		));
	}
	if cfg.batch.default_size == 0 || cfg.batch.max_size == 0 {
		return Err(validation("batch.default_size and batch.max_size must be greater than zero."));
	}
	if cfg.batch.default_size > cfg.batch.max_size {
		return Err(validation("batch.default_size must not exceed batch.max_size."));
	}
	if cfg.schedule.interval_minutes == 0 {
		return Err(validation("schedule.interval_minutes must be greater than zero."));
	}

	for domain in &cfg.eligibility.operator_domains {
		if domain.is_empty() || domain.contains('@') {
			return Err(Error::Validation {
				message: format!("eligibility.operator_domains entry {domain:?} is not a domain."),
			});
		}
	}
	for address in &cfg.eligibility.operator_addresses {
		if !address.contains('@') {
			return Err(Error::Validation {
				message: format!(
					"eligibility.operator_addresses entry {address:?} is not an email address."
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for base in [&mut cfg.store.api_base, &mut cfg.email.api_base, &mut cfg.dispatch.app_base_url]
	{
		let trimmed = base.trim().trim_end_matches('/').to_string();

		*base = trimmed;
	}

	if cfg.email.reply_to.as_deref().map(|value| value.trim().is_empty()).unwrap_or(false) {
		cfg.email.reply_to = None;
	}
	if cfg.security.trigger_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.trigger_token = None;
	}

	cfg.eligibility.operator_domains = cfg
		.eligibility
		.operator_domains
		.iter()
		.map(|domain| domain.trim().trim_start_matches('@').to_ascii_lowercase())
		.filter(|domain| !domain.is_empty())
		.collect();
	cfg.eligibility.operator_addresses = cfg
		.eligibility
		.operator_addresses
		.iter()
		.map(|address| address.trim().to_ascii_lowercase())
		.filter(|address| !address.is_empty())
		.collect();
}

fn validation(message: &str) -> Error {
	Error::Validation { message: message.to_string() }
}
