use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Method, Request, StatusCode},
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::util::ServiceExt;

use rekindle_api::{routes, state::AppState};
use rekindle_domain::Role;
use rekindle_service::RekindleService;
use rekindle_testkit::{MemoryStore, RecordingMailer, character, message, test_config, user};

const TOKEN: &str = "trigger-secret";

fn app(store: Arc<MemoryStore>, mailer: Arc<RecordingMailer>) -> Router {
	let mut cfg = test_config();

	cfg.security.trigger_token = Some(TOKEN.to_string());

	let service = RekindleService::with_collaborators(cfg, store, mailer);

	routes::router(AppState::from_service(service))
}

fn seeded_store() -> Arc<MemoryStore> {
	let now = OffsetDateTime::now_utc();

	Arc::new(
		MemoryStore::new()
			.with_users([user("u1", Some("one@example.com")), user("u2", Some("two@example.com"))])
			.with_characters([character("c1", "Mira")])
			.with_events([
				message("u1", "c1", Role::User, now, 80),
				message("u1", "c1", Role::Assistant, now, 75),
				message("u2", "c1", Role::User, now, 1),
			]),
	)
}

fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
	let mut builder = Request::builder().method(method).uri(uri);

	if let Some(token) = token {
		builder = builder.header("Authorization", format!("Bearer {token}"));
	}

	builder.body(Body::empty()).expect("Failed to build request.")
}

async fn json_body(response: axum::response::Response) -> Value {
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&bytes).expect("Response body must be JSON.")
}

#[tokio::test]
async fn health_is_open() {
	let app = app(seeded_store(), Arc::new(RecordingMailer::new()));
	let response =
		app.oneshot(request(Method::GET, "/health", None)).await.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn triggers_require_the_bearer_token() {
	let mailer = Arc::new(RecordingMailer::new());
	let app = app(seeded_store(), mailer.clone());
	let missing = app
		.clone()
		.oneshot(request(Method::POST, "/v1/inactive/send", None))
		.await
		.expect("Failed to call send.");
	let wrong = app
		.oneshot(request(Method::POST, "/v1/inactive/send", Some("nope")))
		.await
		.expect("Failed to call send.");

	assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(json_body(wrong).await["error_code"], "unauthorized");
	assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn send_reports_progress_and_counts() {
	let store = seeded_store();
	let mailer = Arc::new(RecordingMailer::new());
	let app = app(store.clone(), mailer.clone());
	let response = app
		.oneshot(request(Method::GET, "/v1/inactive/send?start=0&batch=50", Some(TOKEN)))
		.await
		.expect("Failed to call send.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = json_body(response).await;

	assert_eq!(body["start"], 0);
	assert_eq!(body["end"], 2);
	assert_eq!(body["totalUsers"], 2);
	assert_eq!(body["hasMore"], false);
	assert!(body["nextBatch"].is_null());
	assert_eq!(body["sent"], 1);
	assert_eq!(body["skipped"], 1);
	assert_eq!(body["failed"], 0);
	assert_eq!(body["markerFailures"], 0);
	assert_eq!(body["sampleRecipients"][0], "o***@example.com");
	assert_eq!(mailer.sent().len(), 1);
	assert_eq!(store.check_ins().len(), 1);
}

#[tokio::test]
async fn partial_batch_points_at_the_next_offset() {
	let app = app(seeded_store(), Arc::new(RecordingMailer::new()));
	let response = app
		.oneshot(request(Method::POST, "/v1/inactive/send?batch=1", Some(TOKEN)))
		.await
		.expect("Failed to call send.");
	let body = json_body(response).await;

	assert_eq!(body["hasMore"], true);
	assert_eq!(body["nextBatch"], 1);
	assert_eq!(body["end"], 1);
}

#[tokio::test]
async fn malformed_parameters_are_rejected() {
	let app = app(seeded_store(), Arc::new(RecordingMailer::new()));
	let response = app
		.oneshot(request(Method::GET, "/v1/inactive/send?batch=lots", Some(TOKEN)))
		.await
		.expect("Failed to call send.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error_code"], "invalid_request");
}

#[tokio::test]
async fn store_outage_maps_to_bad_gateway() {
	let store = seeded_store();
	let mailer = Arc::new(RecordingMailer::new());

	store.set(&store.fail_query_users, true);

	let app = app(store, mailer.clone());
	let response = app
		.oneshot(request(Method::GET, "/v1/inactive/send", Some(TOKEN)))
		.await
		.expect("Failed to call send.");

	assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

	let body = json_body(response).await;

	assert_eq!(body["error_code"], "upstream_unavailable");
	assert_eq!(body["fields"][0], "query_users");
	assert!(body.get("nextBatch").is_none());
	assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn status_lists_conversations_without_sending() {
	let mailer = Arc::new(RecordingMailer::new());
	let app = app(seeded_store(), mailer.clone());
	let response = app
		.oneshot(request(Method::GET, "/v1/inactive/status", Some(TOKEN)))
		.await
		.expect("Failed to call status.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = json_body(response).await;
	let conversations = body["conversations"].as_array().expect("conversations must be a list.");

	assert_eq!(conversations.len(), 2);
	assert_eq!(conversations[0]["userRef"], "u1");
	assert_eq!(conversations[0]["state"], "waiting_for_user");
	assert_eq!(conversations[0]["eligible"], true);
	assert_eq!(conversations[1]["exclusion"], "not_due");
	assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn chats_overview_counts_states() {
	let app = app(seeded_store(), Arc::new(RecordingMailer::new()));
	let response = app
		.oneshot(request(Method::GET, "/v1/inactive/chats", Some(TOKEN)))
		.await
		.expect("Failed to call chats.");
	let body = json_body(response).await;

	assert_eq!(body["conversations"], 2);
	assert_eq!(body["due"], 1);
	assert_eq!(body["states"]["waiting_for_user"], 1);
	assert_eq!(body["states"]["recently_active"], 1);
}

#[tokio::test]
async fn preview_of_unknown_user_is_not_found() {
	let app = app(seeded_store(), Arc::new(RecordingMailer::new()));
	let response = app
		.oneshot(request(
			Method::GET,
			"/v1/inactive/preview?user=ghost&character=c1",
			Some(TOKEN),
		))
		.await
		.expect("Failed to call preview.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(json_body(response).await["error_code"], "not_found");
}

#[tokio::test]
async fn preview_renders_the_message() {
	let app = app(seeded_store(), Arc::new(RecordingMailer::new()));
	let response = app
		.oneshot(request(Method::GET, "/v1/inactive/preview?user=u1&character=c1", Some(TOKEN)))
		.await
		.expect("Failed to call preview.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = json_body(response).await;

	assert_eq!(body["subject"], "Mira sent you a message");
	assert_eq!(body["eligible"], true);
	assert_eq!(body["deepLink"], "https://app.example.net/chat/mira");
}
