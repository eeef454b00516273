//! Rate-limit telemetry and the reset endpoint.

use crate::common::{SESSION_ID, content, done, error, mount_stream, rate_limit, session_for};
use scribe_engine::{RateLimitStatus, RateLimits, Section};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESET_PATH: &str = "/api/ai-assist/reset-limits";

#[tokio::test]
async fn telemetry_overwrites_both_counters() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Projects,
        &[rate_limit(14, 49), content("a"), rate_limit(2, 48), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Projects);
    assert_eq!(session.rate_limits(), RateLimits::new(15, 50));
    session.send_message("go").await;

    assert_eq!(session.rate_limits(), RateLimits::new(2, 48));
    assert_eq!(
        session.rate_limit_status(),
        RateLimitStatus::Low { remaining: 2 }
    );
}

#[tokio::test]
async fn exhausted_section_still_reports_server_error() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Summary,
        &[rate_limit(0, 30), error("Section limit reached")],
    )
    .await;

    let mut session = session_for(&server, Section::Summary);
    session.send_message("go").await;
    assert!(session.rate_limit_status().is_exhausted());
    assert_eq!(session.error(), Some("Section limit reached"));

    // Exhaustion is advisory; the session still sends.
    assert!(session.send_message("again").await);
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn reset_restores_defaults_on_success() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Skills, &[rate_limit(0, 5), done()]).await;
    Mock::given(method("POST"))
        .and(path(RESET_PATH))
        .and(body_json(json!({"session_id": SESSION_ID, "section": "skills"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = session_for(&server, Section::Skills);
    session.send_message("go").await;
    assert_eq!(session.rate_limits(), RateLimits::new(0, 5));

    session.reset_rate_limits().await.expect("reset");
    assert_eq!(session.rate_limits(), RateLimits::new(15, 50));
    assert_eq!(session.rate_limit_status(), RateLimitStatus::Available);
}

#[tokio::test]
async fn failed_reset_leaves_counters_and_error_alone() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Experience, &[rate_limit(1, 9), done()]).await;
    Mock::given(method("POST"))
        .and(path(RESET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Not allowed"})))
        .mount(&server)
        .await;

    let mut session = session_for(&server, Section::Experience);
    session.send_message("go").await;

    let err = session.reset_rate_limits().await.unwrap_err();
    assert_eq!(err.to_string(), "Not allowed");
    assert_eq!(session.rate_limits(), RateLimits::new(1, 9));
    assert!(session.error().is_none());
}

#[tokio::test]
async fn configured_defaults_apply_to_clear_and_reset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RESET_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    mount_stream(&server, Section::Summary, &[rate_limit(1, 1), done()]).await;

    let mut session =
        session_for(&server, Section::Summary).with_rate_limit_defaults(RateLimits::new(5, 20));
    assert_eq!(session.rate_limits(), RateLimits::new(5, 20));

    session.send_message("go").await;
    session.reset_rate_limits().await.expect("reset");
    assert_eq!(session.rate_limits(), RateLimits::new(5, 20));

    session.send_message("go").await;
    session.clear_messages();
    assert_eq!(session.rate_limits(), RateLimits::new(5, 20));
}
