//! Session turns against a mock assistant server.

use std::time::Duration;

use crate::common::{
    content, done, error, mount_status, mount_stream, mount_stream_for, rate_limit,
    request_bodies, session_for,
};
use scribe_engine::session::STREAM_DISCONNECTED_MESSAGE;
use scribe_engine::{RateLimits, Role, Section, SessionUpdate};
use serde_json::json;
use wiremock::MockServer;

#[tokio::test]
async fn streamed_fragments_become_one_assistant_message() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Projects,
        &[content("Hel"), content("lo"), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Projects);
    assert!(session.send_message("Add a project").await);

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[0].content(), "Add a project");
    assert_eq!(messages[1].role(), Role::Assistant);
    assert_eq!(messages[1].content(), "Hello");
    assert!(!session.is_loading());
    assert!(session.error().is_none());
}

#[tokio::test]
async fn request_carries_prior_turns_and_session() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Summary, &[content("ok"), done()]).await;

    let mut session = session_for(&server, Section::Summary);
    session.send_message("first").await;
    session.send_message("second").await;

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["conversation_history"], json!([]));
    assert_eq!(
        bodies[1]["conversation_history"],
        json!([
            {"role": "user", "content": "first"},
            {"role": "assistant", "content": "ok"}
        ])
    );
    assert_eq!(bodies[1]["user_message"], "second");
    assert_eq!(bodies[1]["session_id"], crate::common::SESSION_ID);
    assert_eq!(bodies[1]["stream"], true);
}

#[tokio::test]
async fn blank_input_sends_nothing() {
    let server = MockServer::start().await;
    let mut session = session_for(&server, Section::Skills);
    assert!(!session.send_message("  \t ").await);
    assert!(session.messages().is_empty());
    assert!(request_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn cancel_keeps_user_message_without_error() {
    let server = MockServer::start().await;
    mount_stream_for(
        &server,
        Section::Experience,
        "slow",
        &[content("late"), done()],
        Some(Duration::from_millis(500)),
    )
    .await;

    let mut session = session_for(&server, Section::Experience);
    assert!(session.start_message("slow"));
    assert!(session.is_loading());
    tokio::time::sleep(Duration::from_millis(50)).await;

    session.cancel_request();
    assert!(!session.is_loading());
    assert!(!session.is_streaming());
    assert!(session.error().is_none());

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(session.process_stream_events().is_empty());
    assert!(session.wait_for_event().await.is_none());
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].content(), "slow");
}

#[tokio::test]
async fn new_message_supersedes_stream_in_flight() {
    let server = MockServer::start().await;
    mount_stream_for(
        &server,
        Section::Projects,
        "first",
        &[content("stale reply"), done()],
        Some(Duration::from_millis(300)),
    )
    .await;
    mount_stream_for(
        &server,
        Section::Projects,
        "second",
        &[content("fresh reply"), done()],
        None,
    )
    .await;

    let mut session = session_for(&server, Section::Projects);
    session.start_message("first");
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.send_message("second").await;

    // Let the superseded response arrive; it must not be applied.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(session.process_stream_events().is_empty());

    let contents: Vec<_> = session.messages().iter().map(|m| m.content()).collect();
    assert_eq!(contents, ["first", "second", "fresh reply"]);
    assert!(session.error().is_none());

    let bodies = request_bodies(&server).await;
    let second = bodies
        .iter()
        .find(|body| body["user_message"] == "second")
        .expect("second request");
    assert_eq!(
        second["conversation_history"],
        json!([{"role": "user", "content": "first"}])
    );
}

#[tokio::test]
async fn error_status_uses_server_message() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        Section::Summary,
        400,
        r#"{"error":"user_message is required"}"#,
    )
    .await;

    let mut session = session_for(&server, Section::Summary);
    session.send_message("hi").await;
    assert_eq!(session.error(), Some("user_message is required"));
    assert!(!session.is_loading());
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn error_status_without_body_uses_generic_message() {
    let server = MockServer::start().await;
    mount_status(&server, Section::Skills, 502, "<html>bad gateway</html>").await;

    let mut session = session_for(&server, Section::Skills);
    session.send_message("hi").await;
    assert_eq!(
        session.error(),
        Some(scribe_engine::scribe_client::GENERIC_FAILURE_MESSAGE)
    );
}

#[tokio::test]
async fn server_error_event_keeps_partial_text() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Projects,
        &[content("Working on it"), error("Section limit reached")],
    )
    .await;

    let mut session = session_for(&server, Section::Projects);
    session.send_message("go").await;
    assert_eq!(session.error(), Some("Section limit reached"));
    assert_eq!(session.messages()[1].content(), "Working on it");
}

#[tokio::test]
async fn body_ending_without_done_is_an_error() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Projects, &[content("partial")]).await;

    let mut session = session_for(&server, Section::Projects);
    session.send_message("go").await;
    assert_eq!(session.error(), Some(STREAM_DISCONNECTED_MESSAGE));
    assert_eq!(session.messages()[1].content(), "partial");
    assert!(!session.is_loading());
}

#[tokio::test]
async fn next_turn_clears_previous_error() {
    let server = MockServer::start().await;
    mount_stream_for(&server, Section::Summary, "bad", &[error("nope")], None).await;
    mount_stream_for(&server, Section::Summary, "good", &[content("fine"), done()], None).await;

    let mut session = session_for(&server, Section::Summary);
    session.send_message("bad").await;
    assert_eq!(session.error(), Some("nope"));
    session.send_message("good").await;
    assert!(session.error().is_none());
}

#[tokio::test]
async fn updates_arrive_in_stream_order() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Skills,
        &[rate_limit(9, 40), content("a"), content("b"), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Skills);
    session.start_message("go");
    let mut updates = Vec::new();
    while let Some(update) = session.wait_for_event().await {
        updates.push(update);
    }
    assert_eq!(
        updates,
        vec![
            SessionUpdate::RateLimit(RateLimits::new(9, 40)),
            SessionUpdate::Content("a".into()),
            SessionUpdate::Content("b".into()),
            SessionUpdate::Done,
        ]
    );
}

#[tokio::test]
async fn clear_resets_conversation_and_limits() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Experience,
        &[rate_limit(2, 10), content("reply"), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Experience);
    session.send_message("go").await;
    assert_eq!(session.rate_limits(), RateLimits::new(2, 10));

    session.clear_messages();
    assert!(session.messages().is_empty());
    assert!(session.current_suggestion().is_none());
    assert!(session.error().is_none());
    assert_eq!(session.rate_limits(), RateLimits::new(15, 50));
}
