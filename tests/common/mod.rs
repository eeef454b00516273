//! Shared test utilities and fixtures
//!
//! A `wiremock` server stands in for the assistant endpoint; helpers build the
//! newline-delimited `data: {json}` bodies it streams back.

#![allow(dead_code)]

use std::time::Duration;

use scribe_engine::{AssistClient, AssistSession, ResumeContext, Section};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SESSION_ID: &str = "integration-session";

pub fn event(value: &Value) -> String {
    format!("data: {value}\n")
}

pub fn content(text: &str) -> String {
    event(&json!({"type": "content", "data": text}))
}

pub fn suggestion(payload: &Value) -> String {
    event(&json!({"type": "suggestion", "data": payload}))
}

pub fn rate_limit(section: u32, session: u32) -> String {
    event(&json!({
        "type": "rate_limit",
        "data": {"remaining_section": section, "remaining_session": session}
    }))
}

pub fn done() -> String {
    event(&json!({"type": "done"}))
}

pub fn error(message: &str) -> String {
    event(&json!({"type": "error", "data": message}))
}

pub fn section_path(section: Section) -> String {
    format!("/api/ai-assist/{}", section.as_str())
}

fn stream_response(lines: &[String]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(lines.concat())
        .insert_header("content-type", "text/event-stream")
}

/// Answer every turn for `section` with `lines`.
pub async fn mount_stream(server: &MockServer, section: Section, lines: &[String]) {
    Mock::given(method("POST"))
        .and(path(section_path(section)))
        .respond_with(stream_response(lines))
        .mount(server)
        .await;
}

/// Answer only turns whose `user_message` equals `user_message`.
pub async fn mount_stream_for(
    server: &MockServer,
    section: Section,
    user_message: &str,
    lines: &[String],
    delay: Option<Duration>,
) {
    let mut response = stream_response(lines);
    if let Some(delay) = delay {
        response = response.set_delay(delay);
    }
    Mock::given(method("POST"))
        .and(path(section_path(section)))
        .and(body_partial_json(json!({"user_message": user_message})))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, section: Section, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(section_path(section)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

pub fn session_for(server: &MockServer, section: Section) -> AssistSession {
    let client = AssistClient::new(server.uri()).expect("client");
    AssistSession::new(client, section, SESSION_ID, ResumeContext::default())
}

/// Every request body the server has seen, in order.
pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|req| serde_json::from_slice(&req.body).ok())
        .collect()
}
