use std::sync::Arc;

use time::{OffsetDateTime, macros::datetime};

use rekindle_domain::{ActivityState, Exclusion, Role};
use rekindle_service::{BatchCursor, BatchRequest, Error, PreviewRequest, RekindleService};
use rekindle_testkit::{MemoryStore, RecordingMailer, character, message, test_config, user};

const NOW: OffsetDateTime = datetime!(2026-05-01 09:00 UTC);

struct Harness {
	store: Arc<MemoryStore>,
	mailer: Arc<RecordingMailer>,
	service: RekindleService,
}

fn harness(store: MemoryStore) -> Harness {
	harness_with(store, test_config())
}

fn harness_with(store: MemoryStore, cfg: rekindle_config::Config) -> Harness {
	let store = Arc::new(store);
	let mailer = Arc::new(RecordingMailer::new());
	let service = RekindleService::with_collaborators(cfg, store.clone(), mailer.clone());

	Harness { store, mailer, service }
}

fn cursor(start: u64, batch: u32) -> BatchCursor {
	BatchCursor { start_offset: start, batch_size: batch }
}

/// Three conversations, 48 events. Only `u1/c1` ends with an assistant turn 73 hours ago.
fn scenario_store() -> MemoryStore {
	let mut events = Vec::new();

	for i in 0..16_i64 {
		let role = if i % 2 == 0 { Role::User } else { Role::Assistant };

		events.push(message("u1", "c1", role, NOW, 73 + (15 - i)));
		events.push(message("u2", "c1", role, NOW, 2 + i));
		events.push(message("u3", "c2", role, NOW, 5 + i));
	}

	MemoryStore::new()
		.with_users([
			user("u1", Some("one@example.com")),
			user("u2", Some("two@example.com")),
			user("u3", Some("three@example.com")),
		])
		.with_characters([character("c1", "Mira"), character("c2", "Taro")])
		.with_events(events)
}

#[tokio::test]
async fn stale_assistant_conversation_gets_one_email_and_a_marker() {
	let h = harness(scenario_store());
	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.sent, 1);
	assert_eq!(report.dispatch.failed, 0);
	assert_eq!(report.dispatch.skipped, 2);
	assert_eq!(report.dispatch.sample_recipients, vec!["o***@example.com".to_string()]);

	let sent = h.mailer.sent();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].to, "one@example.com");
	assert_eq!(sent[0].subject, "Mira sent you a message");
	assert!(sent[0].text_body.contains("https://app.example.net/chat/mira"));

	let check_ins = h.store.check_ins();

	assert_eq!(check_ins.len(), 1);
	assert_eq!(check_ins[0].user_ref.as_deref(), Some("u1"));
	assert_eq!(check_ins[0].character_ref.as_deref(), Some("c1"));
	assert_eq!(check_ins[0].timestamp, NOW);
}

#[tokio::test]
async fn recorded_check_in_suppresses_the_next_run() {
	let h = harness(scenario_store());

	h.service.send_batch(cursor(0, 50), NOW).await.expect("First batch must succeed.");

	let later = NOW + time::Duration::hours(4);
	let report =
		h.service.send_batch(cursor(0, 50), later).await.expect("Second batch must succeed.");

	assert_eq!(report.dispatch.sent, 0);
	assert_eq!(report.dispatch.skipped, 3);
	assert_eq!(h.mailer.sent().len(), 1);

	let status = h.service.status(cursor(0, 50), later).await.expect("Status must succeed.");
	let u1 = status
		.conversations
		.iter()
		.find(|c| c.user_ref == "u1")
		.expect("u1 must be reported.");

	assert_eq!(u1.state, ActivityState::AlreadySent);
	assert_eq!(u1.exclusion, Some(Exclusion::AlreadySent));
}

#[tokio::test]
async fn operator_accounts_never_receive_mail() {
	let store = MemoryStore::new()
		.with_users([user("u1", Some("qa@internal-test-domain"))])
		.with_characters([character("c1", "Mira")])
		.with_events([message("u1", "c1", Role::Assistant, NOW, 80)]);
	let h = harness(store);
	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.sent, 0);
	assert_eq!(report.dispatch.skipped, 1);
	assert!(h.mailer.sent().is_empty());
	assert!(h.store.check_ins().is_empty());
}

#[tokio::test]
async fn batch_never_requests_more_than_its_size() {
	let users = (0..120).map(|i| user(&format!("u{i:03}"), Some("x@example.com")));
	let h = harness(MemoryStore::new().with_users(users));
	let first = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");
	let last = h.service.send_batch(cursor(100, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(h.store.user_queries(), vec![(0, 50), (100, 50)]);
	assert!(first.progress.has_more);
	assert_eq!(first.progress.next_batch, Some(50));
	assert_eq!(first.progress.end, 50);
	assert!(!last.progress.has_more);
	assert_eq!(last.progress.next_batch, None);
	assert_eq!(last.progress.end, 120);
}

#[tokio::test]
async fn exact_fit_batch_completes_the_scan() {
	let users = (0..50).map(|i| user(&format!("u{i:02}"), None));
	let h = harness(MemoryStore::new().with_users(users));
	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert!(!report.progress.has_more);
	assert_eq!(report.progress.next_batch, None);
	assert_eq!(report.progress.total_users, 50);
}

#[tokio::test]
async fn store_outage_fails_the_whole_batch() {
	let h = harness(scenario_store());

	h.store.set(&h.store.fail_query_events, true);

	let err = h.service.send_batch(cursor(0, 50), NOW).await.expect_err("Batch must fail.");

	assert!(matches!(err, Error::UpstreamUnavailable { stage: "query_chat_events", .. }));
	assert!(h.mailer.sent().is_empty());

	h.store.set(&h.store.fail_query_events, false);
	h.store.set(&h.store.fail_query_users, true);

	let err = h.service.send_batch(cursor(0, 50), NOW).await.expect_err("Batch must fail.");

	assert!(matches!(err, Error::UpstreamUnavailable { stage: "query_users", .. }));
}

fn two_due_conversations() -> MemoryStore {
	MemoryStore::new()
		.with_users([user("u1", Some("one@example.com")), user("u2", Some("two@example.com"))])
		.with_characters([character("c1", "Mira")])
		.with_events([
			message("u1", "c1", Role::Assistant, NOW, 90),
			message("u2", "c1", Role::Assistant, NOW, 90),
		])
}

#[tokio::test]
async fn rejected_send_does_not_stop_the_batch() {
	let h = harness(two_due_conversations());

	h.mailer.reject("one@example.com");

	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.failed, 1);
	assert_eq!(report.dispatch.sent, 1);
	assert_eq!(h.mailer.sent()[0].to, "two@example.com");

	let check_ins = h.store.check_ins();

	assert_eq!(check_ins.len(), 1);
	assert_eq!(check_ins[0].user_ref.as_deref(), Some("u2"));
}

#[tokio::test]
async fn provider_outage_stops_after_consecutive_failures() {
	let mut cfg = test_config();

	cfg.dispatch.max_consecutive_unavailable = 2;

	let h = harness_with(two_due_conversations(), cfg);

	h.mailer.set_down(true);

	let err = h.service.send_batch(cursor(0, 50), NOW).await.expect_err("Batch must fail.");

	assert!(matches!(err, Error::UpstreamUnavailable { stage: "send_email", .. }));
	assert!(h.store.check_ins().is_empty());
}

#[tokio::test]
async fn single_unavailable_send_is_isolated() {
	let h = harness(two_due_conversations());

	h.mailer.fail_unavailable("one@example.com");

	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.failed, 1);
	assert_eq!(report.dispatch.sent, 1);
}

#[tokio::test]
async fn marker_failure_still_counts_the_send() {
	let h = harness(two_due_conversations());

	h.store.set(&h.store.fail_record_check_in, true);

	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.sent, 2);
	assert_eq!(report.dispatch.marker_failures, 2);
	assert!(h.store.check_ins().is_empty());
}

#[tokio::test]
async fn missing_character_is_counted_as_failed() {
	let store = MemoryStore::new()
		.with_users([user("u1", Some("one@example.com"))])
		.with_events([message("u1", "ghost", Role::Assistant, NOW, 90)]);
	let h = harness(store);
	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.failed, 1);
	assert_eq!(report.dispatch.sent, 0);
	assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn sample_recipients_are_bounded() {
	let mut cfg = test_config();

	cfg.dispatch.sample_limit = 2;

	let users: Vec<_> = (0..5)
		.map(|i| user(&format!("u{i}"), Some(format!("user{i}@example.com").as_str())))
		.collect();
	let events: Vec<_> =
		(0..5).map(|i| message(&format!("u{i}"), "c1", Role::Assistant, NOW, 100)).collect();
	let store = MemoryStore::new()
		.with_users(users)
		.with_characters([character("c1", "Mira")])
		.with_events(events);
	let h = harness_with(store, cfg);
	let report = h.service.send_batch(cursor(0, 50), NOW).await.expect("Batch must succeed.");

	assert_eq!(report.dispatch.sent, 5);
	assert_eq!(report.dispatch.sample_recipients.len(), 2);
}

#[tokio::test]
async fn status_is_stable_without_dispatch() {
	let h = harness(scenario_store());
	let first = h.service.status(cursor(0, 50), NOW).await.expect("Status must succeed.");
	let second = h.service.status(cursor(0, 50), NOW).await.expect("Status must succeed.");
	let eligible = |report: &rekindle_service::StatusReport| {
		report
			.conversations
			.iter()
			.filter(|c| c.eligible)
			.map(|c| (c.user_ref.clone(), c.character_ref.clone()))
			.collect::<Vec<_>>()
	};

	assert_eq!(eligible(&first), vec![("u1".to_string(), "c1".to_string())]);
	assert_eq!(eligible(&first), eligible(&second));
	assert_eq!(first.conversations.len(), 3);
	assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn overview_counts_every_state() {
	let store = scenario_store().with_events([
		message("u9", "c1", Role::User, NOW, 50),
		message("u8", "c1", Role::User, NOW, 100),
	]);
	let h = harness(store);
	let overview = h.service.overview(NOW).await.expect("Overview must succeed.");

	assert_eq!(overview.conversations, 5);
	assert_eq!(overview.states["waiting_for_user"], 1);
	assert_eq!(overview.states["recently_active"], 2);
	assert_eq!(overview.states["upcoming_soon"], 1);
	assert_eq!(overview.states["ready_for_checkin"], 1);
	assert_eq!(overview.states["already_sent"], 0);
	assert_eq!(overview.due, 1);
}

#[tokio::test]
async fn preview_renders_without_sending() {
	let h = harness(scenario_store());
	let request = PreviewRequest { user: "u1".to_string(), character: "c1".to_string() };
	let preview = h.service.preview(&request, NOW).await.expect("Preview must succeed.");

	assert_eq!(preview.state, Some(ActivityState::WaitingForUser));
	assert!(preview.eligible);
	assert_eq!(preview.deep_link, "https://app.example.net/chat/mira");
	assert!(h.mailer.sent().is_empty());

	let missing = PreviewRequest { user: "nobody".to_string(), character: "c1".to_string() };

	assert!(matches!(h.service.preview(&missing, NOW).await, Err(Error::NotFound { .. })));
}

#[test]
fn trigger_parameters_resolve_against_config() {
	let cfg = test_config();
	let cursor = BatchCursor::resolve(BatchRequest { start: Some(100), batch: None }, &cfg.batch);

	assert_eq!(cursor, BatchCursor { start_offset: 100, batch_size: 50 });
}
