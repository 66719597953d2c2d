use axum::{
	Json, Router,
	body::Body,
	extract::{Query, State, rejection::QueryRejection},
	http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;

use rekindle_service::{
	BatchCursor, BatchRequest, Error, OverviewReport, PreviewReport, PreviewRequest, SendReport,
	StatusReport,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	let triggers = Router::new()
		.route("/v1/inactive/send", get(send).post(send))
		.route("/v1/inactive/status", get(status))
		.route("/v1/inactive/chats", get(chats))
		.route("/v1/inactive/preview", get(preview))
		.route_layer(middleware::from_fn_with_state(state.clone(), trigger_auth));

	Router::new().route("/health", get(health)).merge(triggers).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn send(
	State(state): State<AppState>,
	query: Result<Query<BatchRequest>, QueryRejection>,
) -> Result<Json<SendReport>, ApiError> {
	let cursor = cursor(&state, query)?;
	let report = state.service.send_batch(cursor, OffsetDateTime::now_utc()).await?;

	Ok(Json(report))
}

async fn status(
	State(state): State<AppState>,
	query: Result<Query<BatchRequest>, QueryRejection>,
) -> Result<Json<StatusReport>, ApiError> {
	let cursor = cursor(&state, query)?;
	let report = state.service.status(cursor, OffsetDateTime::now_utc()).await?;

	Ok(Json(report))
}

async fn chats(State(state): State<AppState>) -> Result<Json<OverviewReport>, ApiError> {
	let report = state.service.overview(OffsetDateTime::now_utc()).await?;

	Ok(Json(report))
}

async fn preview(
	State(state): State<AppState>,
	query: Result<Query<PreviewRequest>, QueryRejection>,
) -> Result<Json<PreviewReport>, ApiError> {
	let Query(request) = query.map_err(|err| {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text(), None)
	})?;
	let report = state.service.preview(&request, OffsetDateTime::now_utc()).await?;

	Ok(Json(report))
}

fn cursor(
	state: &AppState,
	query: Result<Query<BatchRequest>, QueryRejection>,
) -> Result<BatchCursor, ApiError> {
	let Query(request) = query.map_err(|err| {
		json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			err.body_text(),
			Some(vec!["start".to_string(), "batch".to_string()]),
		)
	})?;

	Ok(BatchCursor::resolve(request, &state.service.cfg.batch))
}

async fn trigger_auth(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
	let authorized = match state.trigger_token.as_deref() {
		Some(expected) => read_bearer_token(req.headers()) == Some(expected),
		None => true,
	};

	if !authorized {
		return json_error(
			StatusCode::UNAUTHORIZED,
			"unauthorized",
			"A valid Bearer token is required.",
			None,
		)
		.into_response();
	}

	next.run(req).await
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into(), fields }
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			Error::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			Error::SweepInProgress => json_error(
				StatusCode::CONFLICT,
				"sweep_in_progress",
				"A re-engagement sweep is already running.",
				None,
			),
			Error::UpstreamUnavailable { stage, message } => {
				tracing::error!(stage, error = %message, "Upstream failure aborted the request.");

				json_error(
					StatusCode::BAD_GATEWAY,
					"upstream_unavailable",
					format!("Upstream unavailable during {stage}."),
					Some(vec![stage.to_string()]),
				)
			},
			Error::InvalidConfig { message } => {
				tracing::error!(error = %message, "Service configuration is invalid.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"Internal error.",
					None,
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
