mod support;

use std::sync::Arc;

use interpreter::prompt::{AUTONOMOUS_SYSTEM_PROMPT, CONVERSATIONAL_SYSTEM_PROMPT, CodePrompt};
use interpreter::{
    ModelBackend, ModelError, Phase, Role, Session, SessionConfig, SessionError, SharedSession,
    TurnOutcome,
};

use support::*;

fn session(backend: Arc<dyn ModelBackend>, files: &[(&str, &str)]) -> (tempfile::TempDir, Session) {
    let (dir, caps) = workspace(files);
    let session = Session::new(backend, caps, SessionConfig::default());
    (dir, session)
}

#[tokio::test]
async fn prose_reply_completes_after_one_call() {
    let backend = ScriptedBackend::replying(&["Sure, here is an explanation."]);
    let (_dir, mut session) = session(backend.clone(), &[]);

    let outcome = session.submit("explain this").await.expect("submit");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    assert_eq!(outcome.model_calls(), 1);
    assert_eq!(session.phase(), Phase::Idle);
    let calls = backend.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0][0].role, Role::System);
    assert_eq!(calls[0][0].content, AUTONOMOUS_SYSTEM_PROMPT);
    assert_eq!(calls[0][1].content, "# User request\nexplain this");

    let history = &session.state().conversation_history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].text, "Sure, here is an explanation.");
}

#[tokio::test]
async fn pending_responses_trigger_exactly_one_more_call() {
    let backend = ScriptedBackend::replying(&[
        "@startCommand\n@readMemory\n@endCommand",
        "Nothing else to do.",
    ]);
    let (_dir, mut session) = session(backend.clone(), &[]);

    let outcome = session.submit("check memory").await.expect("submit");

    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    assert_eq!(outcome.model_calls(), 2);
    assert_eq!(backend.call_count(), 2);
    assert_eq!(
        backend.last_message(1),
        format!("# User request\n{}", response("readMemory", ""))
    );
    assert!(!session.state().has_pending());
}

#[tokio::test]
async fn attached_snippets_are_sent_then_cleared() {
    let backend = ScriptedBackend::replying(&[
        "@startCommand\n@readFile notes.md\n@endCommand",
        "Read it.",
    ]);
    let (_dir, mut session) = session(backend.clone(), &[("notes.md", "one\ntwo")]);

    session.submit("look at the notes").await.expect("submit");

    let second = backend.last_message(1);
    assert!(second.starts_with("# file @ \"notes.md\" totalLines: 2\n0 one\n1 two\n"));
    assert!(second.contains("\n# User request\nresponse to @readFile:"));
    assert!(session.state().code_prompts.is_empty());
}

#[tokio::test]
async fn conversational_sessions_keep_pending_content() {
    let backend = ScriptedBackend::replying(&["@startCommand\n@readMemory\n@endCommand"]);
    let (dir, caps) = workspace(&[]);
    let config = SessionConfig {
        autonomous: false,
        ..SessionConfig::default()
    };
    let mut session = Session::new(backend.clone(), caps, config);

    let outcome = session.submit("hi").await.expect("submit");

    assert!(matches!(outcome, TurnOutcome::Pending { .. }));
    assert_eq!(outcome.model_calls(), 1);
    assert_eq!(backend.calls.lock()[0][0].content, CONVERSATIONAL_SYSTEM_PROMPT);
    assert_eq!(session.state().current_user_request, response("readMemory", ""));
    drop(dir);
}

#[tokio::test]
async fn auto_turn_limit_stops_the_loop() {
    let reply = "@startCommand\n@readMemory\n@endCommand";
    let backend = ScriptedBackend::replying(&[reply, reply, reply]);
    let (_dir, caps) = workspace(&[]);
    let config = SessionConfig {
        max_auto_turns: Some(1),
        ..SessionConfig::default()
    };
    let mut session = Session::new(backend.clone(), caps, config);

    let outcome = session.submit("loop").await.expect("submit");

    assert!(matches!(outcome, TurnOutcome::Pending { .. }));
    assert_eq!(outcome.model_calls(), 2);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn model_failure_rolls_back_the_user_message() {
    let backend = ScriptedBackend::new(vec![Err(ModelError::ContextLengthExceeded)]);
    let (_dir, caps) = workspace(&[]);
    let presenter = Arc::new(RecordingPresenter::default());
    let mut session = Session::new(
        backend,
        caps.with_presenter(presenter.clone()),
        SessionConfig::default(),
    );

    let err = session.submit("hello").await.expect_err("model failure");

    assert!(matches!(
        err,
        SessionError::Model(ModelError::ContextLengthExceeded)
    ));
    assert!(session.state().conversation_history.is_empty());
    assert_eq!(session.state().current_user_request, "hello");
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(
        *presenter.errors.lock(),
        vec![ModelError::ContextLengthExceeded.user_message().to_string()]
    );
}

#[tokio::test]
async fn command_failure_halts_and_is_merged_into_next_request() {
    let backend = ScriptedBackend::replying(&[
        "@startCommand\n@undo\n@endCommand",
        "Sorry about that.",
    ]);
    let (_dir, mut session) = session(backend.clone(), &[]);

    let outcome = session.submit("fix it").await.expect("submit");

    let TurnOutcome::Halted { replies, error } = outcome else {
        panic!("expected a halted turn, got {:?}", outcome);
    };
    assert_eq!(replies.len(), 1);
    assert_eq!(error, "@undo: no active document");
    assert_eq!(
        session.state().current_user_request,
        "error: @undo: no active document"
    );
    assert_eq!(backend.call_count(), 1);

    session.submit("try again").await.expect("second submit");
    assert_eq!(
        backend.last_message(1),
        "# User request\nerror: @undo: no active document\ntry again"
    );
}

#[tokio::test]
async fn reply_parse_error_halts_like_a_command_failure() {
    let backend = ScriptedBackend::replying(&["@startCommand\n@input a.txt 0 0 \"x\"\n@endCommand"]);
    let (_dir, mut session) = session(backend, &[]);

    let outcome = session.submit("edit").await.expect("submit");

    let TurnOutcome::Halted { error, .. } = outcome else {
        panic!("expected a halted turn, got {:?}", outcome);
    };
    assert!(error.contains("invalid @input argument: a.txt"));
    assert!(session.state().current_user_request.starts_with("error: "));
}

#[tokio::test]
async fn unrecoverable_failures_propagate() {
    let backend =
        ScriptedBackend::replying(&["@startCommand\n@startReplace a.txt 0 0 0 0\nx\n@endReplace\n@endCommand"]);
    let (_dir, mut caps) = workspace(&[("a.txt", "")]);
    caps.editor = Arc::new(BrokenEditor);
    let mut session = Session::new(backend, caps, SessionConfig::default());

    let err = session.submit("edit").await.expect_err("internal failure");
    assert!(matches!(err, SessionError::Interpreter(_)));
}

#[tokio::test]
async fn clear_conversation_command_empties_history() {
    let backend = ScriptedBackend::replying(&["@startCommand\n@clearConversation\n@endCommand"]);
    let (_dir, mut session) = session(backend, &[]);

    let outcome = session.submit("start over").await.expect("submit");

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            replies: vec!["@startCommand\n@clearConversation\n@endCommand".to_string()]
        }
    );
    assert!(session.state().conversation_history.is_empty());
}

#[tokio::test]
async fn system_prompt_override_is_sent() {
    let backend = ScriptedBackend::replying(&["ok"]);
    let (_dir, caps) = workspace(&[]);
    let config = SessionConfig {
        system_prompt: Some("be brief".to_string()),
        ..SessionConfig::default()
    };
    let mut session = Session::new(backend.clone(), caps, config);
    session.submit("hi").await.expect("submit");

    assert_eq!(backend.calls.lock()[0][0].content, "be brief");
}

#[tokio::test]
async fn snippet_and_history_editing() {
    let backend = ScriptedBackend::replying(&["first", "second"]);
    let (_dir, mut session) = session(backend, &[]);

    session.attach(CodePrompt::file("a.rs", "fn a() {}"));
    session.attach(CodePrompt::selection("b.rs", "fn b() {}", 4));
    assert_eq!(
        session.remove_snippet(0),
        Some(CodePrompt::file("a.rs", "fn a() {}"))
    );
    assert_eq!(session.remove_snippet(5), None);

    session.submit("one").await.expect("submit");
    let history = &session.state().conversation_history;
    assert_eq!(
        history[0].code_prompts,
        vec![CodePrompt::selection("b.rs", "fn b() {}", 4)]
    );

    session.submit("two").await.expect("submit");
    assert_eq!(session.state().conversation_history.len(), 4);
    let removed = session.delete_message(1).expect("message 1");
    assert_eq!(removed.text, "first");
    assert_eq!(session.delete_message(10), None);

    session.clear_conversation();
    assert!(session.state().conversation_history.is_empty());
}

#[tokio::test]
async fn submissions_while_busy_are_rejected() {
    let backend = Arc::new(GatedBackend::default());
    let (_dir, caps) = workspace(&[]);
    let shared = SharedSession::new(Session::new(
        backend.clone(),
        caps,
        SessionConfig::default(),
    ));

    let first = tokio::spawn({
        let shared = shared.clone();
        async move { shared.submit("first").await }
    });
    backend.entered.notified().await;

    let err = shared.submit("second").await.expect_err("busy");
    assert!(matches!(err, SessionError::Busy));

    backend.release.notify_one();
    let outcome = first.await.expect("join").expect("first submit");
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    assert_eq!(outcome.model_calls(), 1);

    let session = shared.lock().await;
    assert_eq!(session.state().conversation_history.len(), 2);
    assert_eq!(session.state().conversation_history[0].text, "first");
}
