use docent_core::files::PDF_MEDIA_TYPE;
use docent_core::state::{IgnoredReason, Speaker, SubmitOutcome};
use docent_core::transport::{MockReply, RawResponse};
use docent_core::{
    ClientSettings, CredentialStore, DocentClient, ExternalIdentity, MockTransport, UploadFile,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn client(mock: &MockTransport) -> DocentClient {
    DocentClient::with_transport(
        &ClientSettings::default(),
        CredentialStore::in_memory(),
        Arc::new(mock.clone()),
    )
}

#[tokio::test]
async fn register_upload_and_chat_round() {
    let mock = MockTransport::new();
    mock.push_json(
        200,
        json!({"user": {"id": "u-1", "email": "ada@example.com", "name": "Ada"}}),
    )
    .push_json(
        200,
        json!({"doc_id": "d-1", "meta": {"filename": "lease.pdf"}, "summary": ["Term: 12 months"]}),
    )
    .push_json(200, json!(["Term: 12 months", "Rent due on the 1st"]))
    .push_json(200, json!({"response": "Rent is due on the 1st."}))
    .push_json(500, json!({"detail": "Model overloaded"}));
    let client = client(&mock);

    let profile = client
        .session
        .register("Ada", "ada@example.com", "pw")
        .await
        .expect("register");
    let file = UploadFile::new("lease.pdf", PDF_MEDIA_TYPE, vec![0u8; 5 * 1024 * 1024]);
    let record = client
        .files
        .upload_document(Some(&file), &profile.id)
        .await
        .expect("upload");

    let (summary, session) = client.open_chat(record.id.clone()).await.expect("open");
    assert_eq!(summary.word_count, 2);

    assert_eq!(
        session.submit("What is the deadline?").await,
        SubmitOutcome::Answered
    );
    assert_eq!(
        session.submit("What is the deadline?").await,
        SubmitOutcome::Apologized
    );

    let transcript = session.transcript();
    let speakers: Vec<Speaker> = transcript.iter().map(|turn| turn.speaker).collect();
    assert_eq!(
        speakers,
        vec![
            Speaker::Assistant,
            Speaker::User,
            Speaker::Assistant,
            Speaker::User,
            Speaker::Assistant
        ]
    );
    assert_eq!(transcript[2].text, "Rent is due on the 1st.");
    assert!(transcript[4].text.contains("Model overloaded"));
    assert!(!session.is_awaiting_reply());

    // Every call after registration carried the minted token.
    for request in mock.requests().iter().skip(1) {
        assert_eq!(request.header("Authorization"), Some("Bearer token_u-1"));
    }
}

#[tokio::test]
async fn concurrent_calls_complete_out_of_order() {
    let mock = MockTransport::new();
    mock.push_delayed(
        MockReply::Respond(RawResponse::json(200, &json!({"documents": []}))),
        Duration::from_millis(60),
    )
    .push_delayed(
        MockReply::Respond(RawResponse::json(200, &json!(["fast"]))),
        Duration::from_millis(5),
    );
    let client = client(&mock);

    let finished = Mutex::new(Vec::new());

    let list = async {
        let result = client.files.list_user_documents("u-1").await;
        finished.lock().unwrap().push("list");
        result
    };
    let summary = async {
        let result = client.documents.get_summary("doc-1").await;
        finished.lock().unwrap().push("summary");
        result
    };
    let (list, summary) = futures::join!(list, summary);

    assert!(list.expect("list").is_empty());
    assert_eq!(summary.expect("summary").word_count, 1);
    assert_eq!(*finished.lock().unwrap(), vec!["summary", "list"]);
    assert_eq!(mock.completed_calls(), 2);
    // The list was dispatched first even though it finished last.
    assert!(mock.requests()[0].url.contains("/documents/user/u-1"));
}

#[tokio::test]
async fn separate_sessions_do_not_block_each_other() {
    let mock = MockTransport::new();
    mock.push_delayed(
        MockReply::Respond(RawResponse::json(200, &json!({"response": "a"}))),
        Duration::from_millis(30),
    )
    .push_delayed(
        MockReply::Respond(RawResponse::json(200, &json!({"response": "b"}))),
        Duration::from_millis(30),
    );
    let client = client(&mock);
    client.session.login_with_external_identity(ExternalIdentity::google());
    let first = client.chat_session("doc-1");
    let second = client.chat_session("doc-2");

    let (a, b) = futures::join!(first.submit("question"), second.submit("question"));

    assert_eq!(a, SubmitOutcome::Answered);
    assert_eq!(b, SubmitOutcome::Answered);
    assert_eq!(first.transcript().len(), 3);
    assert_eq!(second.transcript().len(), 3);
}

#[tokio::test]
async fn timeout_becomes_an_apology_and_frees_the_session() {
    let mock = MockTransport::new();
    mock.push(MockReply::Hang)
        .push_json(200, json!({"response": "Back online."}));
    let settings = ClientSettings::default().with_timeout(Duration::from_millis(50));
    let client = DocentClient::with_transport(
        &settings,
        CredentialStore::in_memory(),
        Arc::new(mock.clone()),
    );
    client.session.login_with_external_identity(ExternalIdentity::google());
    let session = client.chat_session("doc-1");

    assert_eq!(session.submit("hello").await, SubmitOutcome::Apologized);
    assert_eq!(
        session.transcript()[2].text,
        "Sorry, I couldn't get a response. Request timed out. Please try again."
    );
    assert_eq!(mock.aborted_calls(), 1);

    assert_eq!(session.submit("hello again").await, SubmitOutcome::Answered);
    assert_eq!(session.transcript().len(), 5);
}

#[tokio::test]
async fn logged_out_client_sends_no_credentials() {
    let mock = MockTransport::new();
    mock.push_json(
        200,
        json!({"user": {"id": "u-1", "email": "ada@example.com", "name": "Ada"}}),
    )
    .push_json(200, json!({"response": "Signed-in answer."}))
    .push_json(200, json!({"documents": []}));
    let client = client(&mock);

    client.session.login("ada@example.com", "pw").await.unwrap();
    let chat = client.chat_session("doc-1");
    assert_eq!(chat.submit("hi").await, SubmitOutcome::Answered);

    client.session.logout();
    assert_eq!(
        chat.submit("after logout").await,
        SubmitOutcome::Ignored(IgnoredReason::NoUser)
    );
    assert_eq!(mock.requests().len(), 2);

    client.files.list_user_documents("u-1").await.unwrap();
    assert_eq!(mock.last_request().unwrap().header("Authorization"), None);
    assert!(client.session.current_user().is_none());
}
