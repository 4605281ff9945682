mod common;

use std::collections::HashSet;

use common::*;

fn review_texts(state: &serde_json::Value) -> Vec<String> {
    state["view"]["slots"]
        .as_array()
        .expect("review view has slots")
        .iter()
        .map(|slot| slot["text"].as_str().unwrap().to_owned())
        .collect()
}

// ---------------------------------------------------------------------------
// Full round
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_round_confirm_then_skip() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1", "S2"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "3")])
        .await;

    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "review");
    assert_eq!(state["view"]["cursor"], 0);
    assert_eq!(state["view"]["total"], 2);
    assert_eq!(state["view"]["system"], "S1");
    assert_eq!(state["view"]["user"], "Hello");
    assert_eq!(review_texts(&state), vec!["reply-1", "reply-2", "reply-3"]);
    assert_eq!(mock.call_count(), 6);

    // Edited texts with responses 0 and 2 marked best.
    app.post_form(
        "/confirm",
        &[
            ("cursor", "0"),
            ("response_0", "a"),
            ("chosen_0", "on"),
            ("response_1", "b"),
            ("response_2", "c"),
            ("chosen_2", "on"),
        ],
    )
    .await;

    let lines = app.dataset_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["messages"][0]["role"], "system");
    assert_eq!(lines[0]["messages"][0]["content"], "S1");
    assert_eq!(lines[0]["messages"][1]["content"], "Hello");
    assert_eq!(lines[0]["messages"][2]["role"], "assistant");
    assert_eq!(lines[0]["messages"][2]["content"], "a");
    assert_eq!(lines[0]["rejected_response"], "b");
    assert_eq!(lines[1]["messages"][2]["content"], "c");
    assert_eq!(lines[1]["rejected_response"], "b");

    let state = app.state().await;
    assert_eq!(state["view"]["cursor"], 1);
    assert_eq!(state["view"]["system"], "S2");
    assert_eq!(state["dataset"].as_array().unwrap().len(), 2);

    app.post_form("/skip", &[("cursor", "1")]).await;

    assert_eq!(app.dataset_lines().len(), 2, "skip must not touch the dataset");
    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "complete");
    assert_eq!(state["view"]["groups_reviewed"], 2);
    assert_eq!(state["view"]["pairs_collected"], 2);

    let session = app.session_json().expect("session file written");
    assert_eq!(session["current_index"], 2);
    assert_eq!(session["annotation_queue"].as_array().unwrap().len(), 2);
    assert_eq!(session["dpo_data"].as_array().unwrap().len(), 2);

    let page = app.page().await;
    assert!(page.contains("Round complete"));
    assert!(page.contains("Reviewed 2 groups and collected 2 pairs"));
}

#[tokio::test]
async fn test_confirm_without_split_counts_as_skip() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "2")])
        .await;
    app.state().await;

    app.post_form(
        "/confirm",
        &[
            ("cursor", "0"),
            ("response_0", "x"),
            ("chosen_0", "on"),
            ("response_1", "y"),
            ("chosen_1", "on"),
        ],
    )
    .await;

    assert!(app.dataset_lines().is_empty());
    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "complete");
    assert!(app.page().await.contains("Skipped group 1."));
}

// ---------------------------------------------------------------------------
// Generation failures and requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_call_substituted_inline() {
    let mock = MockBackendServer::start_failing_on(&[2]).await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "3")])
        .await;

    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "review");
    let texts = review_texts(&state);
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], "reply-1");
    assert!(texts[1].starts_with("API 在生成第 #2 个回复时出错"));
    assert!(texts[1].contains("model crashed"));
    assert_eq!(texts[2], "reply-3");
}

#[tokio::test]
async fn test_completion_requests_carry_context_and_ids() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1", "S2"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "2")])
        .await;
    app.state().await;

    let calls = mock.recorded();
    assert_eq!(calls.len(), 4);

    let body = &calls[0].body;
    assert_eq!(body["model"], TEST_MODEL);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "S1");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Hello");
    assert_eq!(body["temperature"], 0.95);
    assert_eq!(calls[2].body["messages"][0]["content"], "S2");
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer sk-test"));

    // One conversation per group, one turn per request.
    assert!(calls[0].conversation_id.is_some());
    assert_eq!(calls[0].conversation_id, calls[1].conversation_id);
    assert_eq!(calls[2].conversation_id, calls[3].conversation_id);
    assert_ne!(calls[0].conversation_id, calls[2].conversation_id);
    let turns: HashSet<_> = calls.iter().map(|c| c.turn_id.clone().unwrap()).collect();
    assert_eq!(turns.len(), 4);

    let progress = app.get_json("/api/progress").await;
    assert_eq!(progress["completed"], 2);
    assert_eq!(progress["total"], 2);
}

#[tokio::test]
async fn test_regenerate_replaces_current_group() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "2")])
        .await;
    assert_eq!(review_texts(&app.state().await), vec!["reply-1", "reply-2"]);

    app.post_form("/regenerate", &[("cursor", "0")]).await;

    let state = app.state().await;
    assert_eq!(state["view"]["cursor"], 0);
    assert_eq!(review_texts(&state), vec!["reply-3", "reply-4"]);
    let session = app.session_json().unwrap();
    assert_eq!(
        session["annotation_queue"][0]["responses"],
        serde_json::json!(["reply-3", "reply-4"])
    );
}

// ---------------------------------------------------------------------------
// Rejected transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_empty_prompt_rejected_without_generation() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/start", &[("user_prompt", "   "), ("num_responses", "3")])
        .await;

    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "setup");
    assert_eq!(mock.call_count(), 0);
    assert!(app.page().await.contains("user prompt must not be empty"));
}

#[tokio::test]
async fn test_response_count_out_of_range_rejected() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/start", &[("user_prompt", "Hi"), ("num_responses", "21")])
        .await;
    app.state().await;
    assert!(app
        .page()
        .await
        .contains("response count must be between 1 and 20, got 21"));

    app.post_form("/start", &[("user_prompt", "Hi"), ("num_responses", "lots")])
        .await;
    assert!(app.page().await.contains("must be a whole number"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_stale_cursor_is_ignored() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1", "S2"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "2")])
        .await;
    app.state().await;

    let form = [
        ("cursor", "0"),
        ("response_0", "good"),
        ("chosen_0", "on"),
        ("response_1", "bad"),
    ];
    app.post_form("/confirm", &form).await;
    app.page().await;
    // Double submit of the same form.
    app.post_form("/confirm", &form).await;

    assert_eq!(app.dataset_lines().len(), 1);
    let state = app.state().await;
    assert_eq!(state["view"]["cursor"], 1);
    assert!(app.page().await.contains("was for an earlier group"));
}

#[tokio::test]
async fn test_review_action_without_round_reports_error() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/skip", &[("cursor", "0")]).await;

    assert!(app.page().await.contains("no annotation round in progress"));
    assert_eq!(app.state().await["view"]["kind"], "setup");
}

// ---------------------------------------------------------------------------
// Persistence across restarts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_resume_without_session_warns() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/resume", &[]).await;

    let page = app.page().await;
    assert!(page.contains("notice-warning"));
    assert!(page.contains("No resumable session file found."));
    assert_eq!(app.state().await["view"]["kind"], "setup");

    // Notices are shown once.
    assert!(!app.page().await.contains("No resumable session file found."));
}

#[tokio::test]
async fn test_resume_after_restart() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    {
        let app = TestApp::start(&mock.url(), dir.path(), &["S1", "S2"]).await;
        app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "2")])
            .await;
        app.state().await;
        app.post_form(
            "/confirm",
            &[("cursor", "0"), ("chosen_1", "on")],
        )
        .await;
        app.state().await;
    }

    let app = TestApp::start(&mock.url(), dir.path(), &["S1", "S2"]).await;
    assert_eq!(app.state().await["view"]["kind"], "setup");

    app.post_form("/resume", &[]).await;

    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "review");
    assert_eq!(state["view"]["cursor"], 1);
    assert_eq!(review_texts(&state), vec!["reply-3", "reply-4"]);
    assert_eq!(state["dataset"][0]["messages"][2]["content"], "reply-2");
    assert_eq!(state["dataset"][0]["rejected_response"], "reply-1");
    assert_eq!(mock.call_count(), 4, "resume must not generate");

    let dataset = app.get_json("/api/dataset").await;
    assert_eq!(dataset.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_new_round_clears_session_keeps_dataset() {
    let mock = MockBackendServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let app = TestApp::start(&mock.url(), dir.path(), &["S1"]).await;

    app.post_form("/start", &[("user_prompt", "Hello"), ("num_responses", "2")])
        .await;
    app.state().await;
    app.post_form("/confirm", &[("cursor", "0"), ("chosen_0", "on")])
        .await;
    assert!(app.session_json().is_some());

    app.post_form("/new-round", &[]).await;

    assert!(app.session_json().is_none());
    assert_eq!(app.dataset_lines().len(), 1);
    let state = app.state().await;
    assert_eq!(state["view"]["kind"], "setup");
    assert!(state["dataset"].as_array().unwrap().is_empty());

    let page = app.page().await;
    assert!(page.contains("Ready for a new annotation round."));
    assert!(page.contains("Write a haiku about autumn."));
}
