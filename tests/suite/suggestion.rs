//! Suggestion delivery, dedupe and refinement over HTTP.

use crate::common::{content, done, mount_stream, mount_stream_for, request_bodies, session_for, suggestion};
use scribe_engine::{Section, SessionUpdate, Suggestion, refinements};
use serde_json::{Value, json};
use wiremock::MockServer;

fn summary_payload(text: &str) -> Value {
    json!({"summary": text, "message": "Here is a tighter summary."})
}

fn project_payload(title: &str) -> Value {
    json!({
        "projects": [{
            "title": title,
            "technologies": "Rust, Tokio",
            "description": ["Streams assistant output to the terminal"]
        }],
        "message": "I drafted a project entry."
    })
}

#[tokio::test]
async fn summary_suggestion_is_applied_once() {
    let server = MockServer::start().await;
    let payload = summary_payload("Backend engineer focused on reliability.");
    mount_stream(
        &server,
        Section::Summary,
        &[
            content("Let me draft that."),
            suggestion(&payload),
            suggestion(&payload),
            content(" (hidden narration)"),
            done(),
        ],
    )
    .await;

    let mut session = session_for(&server, Section::Summary);
    session.start_message("Write my summary");
    let mut updates = Vec::new();
    while let Some(update) = session.wait_for_event().await {
        updates.push(update);
    }

    assert_eq!(
        updates,
        vec![
            SessionUpdate::Content("Let me draft that.".into()),
            SessionUpdate::Suggestion {
                note: Some("Here is a tighter summary.".into()),
                applied: true
            },
            SessionUpdate::DuplicateSuggestion,
            SessionUpdate::ContentSuppressed,
            SessionUpdate::Done,
        ]
    );

    let contents: Vec<_> = session.messages().iter().map(|m| m.content()).collect();
    assert_eq!(
        contents,
        [
            "Write my summary",
            "Let me draft that.",
            "Here is a tighter summary."
        ]
    );
    assert!(session.messages()[2].is_suggestion());
    assert_eq!(
        session
            .current_suggestion()
            .and_then(Suggestion::as_summary)
            .map(|s| s.summary.as_str()),
        Some("Backend engineer focused on reliability.")
    );
}

#[tokio::test]
async fn same_payload_in_a_later_turn_is_applied_again() {
    let server = MockServer::start().await;
    let payload = summary_payload("Same text");
    mount_stream(&server, Section::Summary, &[suggestion(&payload), done()]).await;

    let mut session = session_for(&server, Section::Summary);
    session.send_message("one").await;
    session.reject_suggestion();
    session.send_message("two").await;

    assert!(session.current_suggestion().is_some());
    let notes = session
        .messages()
        .iter()
        .filter(|m| m.is_suggestion())
        .count();
    assert_eq!(notes, 2);
}

#[tokio::test]
async fn payload_for_another_section_is_not_materialized() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Experience,
        &[suggestion(&project_payload("Scribe")), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Experience);
    session.send_message("Add my last job").await;

    assert!(session.current_suggestion().is_none());
    assert!(session.error().is_none());
    assert_eq!(
        session.messages().last().map(|m| m.content()),
        Some("I drafted a project entry.")
    );
}

#[tokio::test]
async fn education_never_materializes() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Education,
        &[suggestion(&json!({"education": [{"school": "MIT"}]})), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Education);
    session.send_message("Add my degree").await;
    assert!(session.current_suggestion().is_none());
    // No narration in the payload, so no note either.
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn accept_hands_over_the_suggestion() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Projects,
        &[suggestion(&project_payload("Scribe")), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Projects);
    session.send_message("Add a project").await;

    let accepted = session.accept_suggestion().expect("suggestion");
    let project = accepted.as_project().expect("project");
    assert_eq!(project.title, "Scribe");
    assert_eq!(project.technologies, "Rust, Tokio");
    assert!(session.current_suggestion().is_none());
}

#[tokio::test]
async fn refinement_sends_prompt_and_replaces_suggestion() {
    let server = MockServer::start().await;
    let quantify = refinements(Section::Projects)
        .iter()
        .find(|r| r.id == "quantify")
        .expect("quantify refinement");

    mount_stream_for(
        &server,
        Section::Projects,
        "Add a project",
        &[suggestion(&project_payload("Scribe")), done()],
        None,
    )
    .await;
    mount_stream_for(
        &server,
        Section::Projects,
        quantify.prompt,
        &[suggestion(&project_payload("Scribe (40% faster)")), done()],
        None,
    )
    .await;

    let mut session = session_for(&server, Section::Projects);
    session.send_message("Add a project").await;
    let used = session.refine("quantify").await.expect("refinement");
    assert_eq!(used.id, "quantify");

    assert_eq!(
        session
            .current_suggestion()
            .and_then(Suggestion::as_project)
            .map(|p| p.title.as_str()),
        Some("Scribe (40% faster)")
    );

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["user_message"], quantify.prompt);
    // The note from the first turn is replayed as assistant history.
    assert_eq!(
        bodies[1]["conversation_history"][1],
        json!({"role": "assistant", "content": "I drafted a project entry."})
    );
}

#[tokio::test]
async fn refinement_without_suggestion_sends_nothing() {
    let server = MockServer::start().await;
    let mut session = session_for(&server, Section::Skills);
    assert!(session.refine("match_jd").await.is_none());
    assert!(request_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn accepted_suggestion_is_sent_as_context_next_turn() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Summary,
        &[suggestion(&summary_payload("Backend engineer.")), done()],
    )
    .await;

    let mut session = session_for(&server, Section::Summary);
    session.send_message("Write my summary").await;

    let accepted = session.accept_suggestion().expect("suggestion");
    let mut context = session.context().clone();
    context.record_accepted(&accepted);
    session.set_context(context);
    session.send_message("Now shorter").await;

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["resume_context"], json!({}));
    assert_eq!(
        bodies[1]["resume_context"],
        json!({"current_summary": "Backend engineer."})
    );
}
