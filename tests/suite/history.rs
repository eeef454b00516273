//! Mode and conversation persistence through the on-disk store.

use chrono::Utc;
use scribe_engine::storage::DEFAULT_QUOTA_BYTES;
use scribe_engine::{
    AssistMode, ConversationExport, ConversationStats, FileStore, HistoryPersistence,
    HistorySettings, KeyValueStore, ModeController, SaveOutcome, Section, parse_export,
};
use tempfile::TempDir;
use wiremock::MockServer;

use crate::common::{content, done, mount_stream, session_for};

fn open(dir: &TempDir) -> FileStore {
    FileStore::open(dir.path().join("storage.json"), DEFAULT_QUOTA_BYTES).expect("open store")
}

#[test]
fn mode_survives_reopening_the_store() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open(&dir);
        let mut mode = ModeController::load(Section::Skills, &store);
        assert!(mode.is_manual());
        assert_eq!(mode.toggle(&mut store), AssistMode::Ai);
        assert!(mode.show_welcome());
    }

    let store = open(&dir);
    let mode = ModeController::load(Section::Skills, &store);
    assert!(mode.is_ai());
    assert!(!mode.show_welcome());
    assert!(ModeController::load(Section::Projects, &store).is_manual());
}

#[tokio::test]
async fn conversation_is_restored_after_restart() {
    let server = MockServer::start().await;
    mount_stream(
        &server,
        Section::Projects,
        &[content("Sounds "), content("good."), done()],
    )
    .await;
    let dir = TempDir::new().unwrap();

    {
        let mut store = open(&dir);
        let history =
            HistoryPersistence::for_mode(Section::Projects, AssistMode::Ai, HistorySettings::default());
        let mut session = session_for(&server, Section::Projects);
        session.send_message("Add my compiler project").await;
        assert_eq!(
            history.save(&mut store, session.messages()),
            SaveOutcome::Saved { messages: 2 }
        );
    }

    let store = open(&dir);
    let history =
        HistoryPersistence::for_mode(Section::Projects, AssistMode::Ai, HistorySettings::default());
    assert!(history.has_history(&store));
    let restored = history.load(&store);
    let session = session_for(&server, Section::Projects).with_history(restored);
    let contents: Vec<_> = session.messages().iter().map(|m| m.content()).collect();
    assert_eq!(contents, ["Add my compiler project", "Sounds good."]);
}

#[tokio::test]
async fn manual_mode_writes_nothing() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Summary, &[content("ok"), done()]).await;
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);

    let history = HistoryPersistence::for_mode(
        Section::Summary,
        AssistMode::Manual,
        HistorySettings::default(),
    );
    let mut session = session_for(&server, Section::Summary);
    session.send_message("hi").await;
    assert_eq!(history.save(&mut store, session.messages()), SaveOutcome::Disabled);
    assert!(store.keys().unwrap().is_empty());
}

#[tokio::test]
async fn clear_removes_the_saved_record() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Skills, &[content("ok"), done()]).await;
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let history =
        HistoryPersistence::for_mode(Section::Skills, AssistMode::Ai, HistorySettings::default());

    let mut session = session_for(&server, Section::Skills);
    session.send_message("hi").await;
    history.save(&mut store, session.messages());

    session.clear_messages();
    history.clear(&mut store);
    assert!(!history.has_history(&open(&dir)));
}

#[tokio::test]
async fn export_round_trips_through_disk() {
    let server = MockServer::start().await;
    mount_stream(&server, Section::Experience, &[content("Noted."), done()]).await;
    let mut session = session_for(&server, Section::Experience);
    session.send_message("I led the platform team").await;

    let export =
        ConversationExport::new(Section::Experience, session.messages(), Utc::now()).unwrap();
    assert!(export.file_name.starts_with("conversation_experience_"));
    assert!(export.file_name.ends_with(".json"));

    let dir = TempDir::new().unwrap();
    let path = export.write_to(dir.path()).unwrap();
    let reloaded = parse_export(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(reloaded, session.messages());

    let stats = ConversationStats::of(&reloaded);
    assert_eq!(stats.total_messages, 2);
    assert_eq!(stats.user_messages, 1);
    assert_eq!(stats.assistant_messages, 1);
}
