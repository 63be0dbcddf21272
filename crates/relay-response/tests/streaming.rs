mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{tokens, user, Call, RecordingPlatform, Script, ScriptedProvider, CHANNEL};
use relay_core::{
    ChatMessage, GeneratedImage, MemoryNodeStorage, NodeRef, NodeStorage, NodeStore,
    OutgoingMessage, PlatformMessage, ResponseAction, Role,
};
use relay_llm::{FailureKind, LLMChunk, LLMError, TokenUsage};
use relay_response::{ResponseController, ResponseError, ResponseRequest, StreamConfig};

struct Harness {
    platform: Arc<RecordingPlatform>,
    provider: Arc<ScriptedProvider>,
    store: Arc<NodeStore>,
    storage: Arc<MemoryNodeStorage>,
    original: PlatformMessage,
}

impl Harness {
    fn new(scripts: Vec<Script>) -> Self {
        let platform = Arc::new(RecordingPlatform::new());
        let original = platform.post(PlatformMessage::new(CHANNEL, "q1", user("7"), "<@bot> hi"));
        Self {
            platform,
            provider: Arc::new(ScriptedProvider::new(scripts)),
            store: Arc::new(NodeStore::new(100)),
            storage: Arc::new(MemoryNodeStorage::new()),
            original,
        }
    }

    fn controller(&self, config: StreamConfig) -> ResponseController {
        ResponseController::new(
            self.platform.clone(),
            self.provider.clone(),
            self.store.clone(),
            self.storage.clone(),
            config,
        )
    }

    /// Post the progress message the caller normally sends first.
    async fn placeholder(&self) -> String {
        use relay_core::ChatPlatform;
        self.platform
            .send_message(CHANNEL, Some("q1"), OutgoingMessage::text("⏳"))
            .await
            .unwrap()
            .id
    }

    fn request(&self, placeholder: Option<String>) -> ResponseRequest {
        ResponseRequest {
            original: self.original.clone(),
            model: "primary".to_string(),
            fallback_model: Some("fallback".to_string()),
            messages: vec![ChatMessage::user("hi")],
            warnings: vec![],
            placeholder,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn completes_with_footer_actions_and_persisted_node() {
    let mut script = match tokens(&["Hello", " world"]) {
        Script::Chunks(chunks) => chunks,
        _ => unreachable!(),
    };
    script.insert(
        2,
        Ok(LLMChunk::Usage(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 2,
            total_tokens: 12,
        })),
    );
    let h = Harness::new(vec![Script::Chunks(script)]);
    let placeholder = h.placeholder().await;

    let outcome = h
        .controller(StreamConfig::default())
        .generate_response(h.request(Some(placeholder.clone())))
        .await
        .unwrap();

    assert_eq!(outcome.text, "Hello world");
    assert_eq!(outcome.model, "primary");
    assert!(!outcome.fallback_used);
    assert_eq!(outcome.message_ids, vec![placeholder.clone()]);
    assert_eq!(outcome.finish_reason.as_deref(), Some("stop"));

    // First chunk forced, second throttled, then the final edit.
    let edits = h.platform.edits();
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0].message().content, "Hello ⚪");
    assert!(edits[0].message().streaming);

    let last = h.platform.latest(&placeholder).unwrap();
    assert_eq!(last.content, "Hello world");
    assert!(!last.streaming);
    assert_eq!(
        last.footer.as_deref(),
        Some("primary · 10 prompt + 2 completion tokens")
    );
    assert_eq!(
        last.actions,
        vec![ResponseAction::Download, ResponseAction::View, ResponseAction::Retry]
    );

    let node = h.store.get(&placeholder).unwrap();
    let node = node.lock().await;
    assert_eq!(node.text, "Hello world");
    assert_eq!(node.role, Role::Assistant);
    assert_eq!(node.parent, Some(NodeRef::new(CHANNEL, "q1")));
    assert!(node.parent_resolved);
    assert!(h.storage.load_node(&placeholder).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn long_body_is_split_across_messages() {
    let body: String = (0..9_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    let parts: Vec<String> = body
        .as_bytes()
        .chunks(100)
        .map(|c| String::from_utf8(c.to_vec()).unwrap())
        .collect();
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    let h = Harness::new(vec![tokens(&parts)]);
    let placeholder = h.placeholder().await;
    let config = StreamConfig {
        max_message_chars: 4_096,
        ..StreamConfig::default()
    };

    let outcome = h
        .controller(config)
        .generate_response(h.request(Some(placeholder.clone())))
        .await
        .unwrap();

    assert_eq!(outcome.message_ids.len(), 3);
    assert_eq!(outcome.message_ids[0], placeholder);

    let finals: Vec<String> = outcome
        .message_ids
        .iter()
        .map(|id| h.platform.latest(id).unwrap().content)
        .collect();
    assert!(finals.iter().all(|c| c.chars().count() <= 4_096));
    assert_eq!(finals.concat(), body);

    // Every message is capped while streaming too, marker included.
    assert!(h
        .platform
        .calls()
        .iter()
        .all(|c| c.message().content.chars().count() <= 4_096));

    // Continuations reply to the previous response message.
    let sends = h.platform.sends();
    let reply_targets: Vec<_> = sends
        .iter()
        .skip(1)
        .map(|c| match c {
            Call::Send { reply_to, .. } => reply_to.clone(),
            Call::Edit { .. } => None,
        })
        .collect();
    assert_eq!(
        reply_targets,
        vec![Some(placeholder), Some(outcome.message_ids[1].clone())]
    );

    // All response messages hold the full text.
    for id in &outcome.message_ids {
        let node = h.store.get(id).unwrap();
        assert_eq!(node.lock().await.text, body);
    }
}

#[tokio::test(start_paused = true)]
async fn second_eligible_failure_is_terminal() {
    let h = Harness::new(vec![
        Script::Fail(LLMError::Http {
            status: 503,
            message: "overloaded".to_string(),
        }),
        Script::Fail(LLMError::Timeout),
    ]);
    let placeholder = h.placeholder().await;

    let err = h
        .controller(StreamConfig::default())
        .generate_response(h.request(Some(placeholder.clone())))
        .await
        .unwrap_err();

    assert_eq!(h.provider.models(), vec!["primary", "fallback"]);
    match err {
        ResponseError::Stream { model, source } => {
            assert_eq!(model, "fallback");
            assert_eq!(source.kind(), FailureKind::Timeout);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        h.platform.latest(&placeholder).unwrap().content,
        "❌ The model took too long to respond"
    );
    assert!(h.store.get(&placeholder).is_none());
}

#[tokio::test(start_paused = true)]
async fn fallback_appends_after_partial_content() {
    let h = Harness::new(vec![
        Script::Chunks(vec![
            Ok(LLMChunk::Token("partial".to_string())),
            Err(LLMError::Stream("upstream overloaded".to_string())),
        ]),
        tokens(&[" answer"]),
    ]);
    let placeholder = h.placeholder().await;

    let outcome = h
        .controller(StreamConfig::default())
        .generate_response(h.request(Some(placeholder.clone())))
        .await
        .unwrap();

    assert!(outcome.fallback_used);
    assert_eq!(outcome.model, "fallback");
    assert_eq!(outcome.text, "partial answer");
    assert_eq!(h.platform.latest(&placeholder).unwrap().content, "partial answer");
    assert_eq!(
        h.platform.latest(&placeholder).unwrap().footer.as_deref(),
        Some("fallback")
    );
}

#[tokio::test(start_paused = true)]
async fn empty_stream_uses_fallback() {
    let h = Harness::new(vec![tokens(&[]), tokens(&["recovered"])]);

    let outcome = h
        .controller(StreamConfig::default())
        .generate_response(h.request(None))
        .await
        .unwrap();

    assert!(outcome.fallback_used);
    assert_eq!(outcome.text, "recovered");
}

#[tokio::test(start_paused = true)]
async fn client_errors_do_not_fall_back() {
    let h = Harness::new(vec![Script::Fail(LLMError::Auth("bad key".to_string()))]);
    let placeholder = h.placeholder().await;

    let err = h
        .controller(StreamConfig::default())
        .generate_response(h.request(Some(placeholder.clone())))
        .await
        .unwrap_err();

    assert!(err.is_stream_failure());
    assert_eq!(h.provider.models(), vec!["primary"]);
    assert_eq!(
        h.platform.latest(&placeholder).unwrap().content,
        "❌ Authentication with the model provider failed"
    );
}

#[tokio::test(start_paused = true)]
async fn watchdog_ends_silent_streams() {
    let h = Harness::new(vec![Script::Stall, Script::Stall]);
    let config = StreamConfig {
        first_content_timeout: Duration::from_secs(30),
        ..StreamConfig::default()
    };
    let started = tokio::time::Instant::now();

    let err = h
        .controller(config)
        .generate_response(h.request(None))
        .await
        .unwrap_err();

    assert_eq!(h.provider.models(), vec!["primary", "fallback"]);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(300));
    match err {
        ResponseError::Stream { source, .. } => assert_eq!(source.kind(), FailureKind::Timeout),
        other => panic!("unexpected error: {other}"),
    }
    // Nothing was shown yet, so the notice is a new reply to the question.
    let sends = h.platform.sends();
    assert_eq!(sends.len(), 1);
    match &sends[0] {
        Call::Send { reply_to, message, .. } => {
            assert_eq!(reply_to.as_deref(), Some("q1"));
            assert_eq!(message.content, "❌ The model took too long to respond");
        }
        Call::Edit { .. } => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn edits_are_throttled() {
    let paced = (0..10)
        .map(|i| (Duration::from_millis(400), format!("t{i} ")))
        .collect();
    let h = Harness::new(vec![Script::Paced(paced)]);
    let placeholder = h.placeholder().await;

    let outcome = h
        .controller(StreamConfig::default())
        .generate_response(h.request(Some(placeholder)))
        .await
        .unwrap();

    // Tokens every 400ms with a 1s edit delay: edits at 0.4s, 1.6s, 2.8s,
    // 4.0s, then the final edit.
    assert_eq!(h.platform.edits().len(), 5);
    assert_eq!(outcome.text.split_whitespace().count(), 10);
}

#[tokio::test(start_paused = true)]
async fn warnings_and_images_are_attached() {
    let image = GeneratedImage {
        mime_type: "image/png".to_string(),
        data: "aGVsbG8=".to_string(),
    };
    let h = Harness::new(vec![Script::Chunks(vec![
        Ok(LLMChunk::Token("Here you go".to_string())),
        Ok(LLMChunk::Image(image.clone())),
        Ok(LLMChunk::Done { finish_reason: None }),
    ])]);
    let mut request = h.request(None);
    request.warnings = vec!["⚠️ Max 5 images per message".to_string()];

    let outcome = h
        .controller(StreamConfig::default())
        .generate_response(request)
        .await
        .unwrap();

    let id = &outcome.message_ids[0];
    let last = h.platform.latest(id).unwrap();
    assert_eq!(last.files, vec![image.clone()]);
    assert_eq!(last.annotations, vec!["⚠️ Max 5 images per message".to_string()]);

    let node = h.store.get(id).unwrap();
    assert_eq!(node.lock().await.generated_images, vec![image]);
}

#[tokio::test(start_paused = true)]
async fn fallback_keeps_images_from_failed_attempt() {
    let image = GeneratedImage {
        mime_type: "image/png".to_string(),
        data: "aGVsbG8=".to_string(),
    };
    let h = Harness::new(vec![
        Script::Chunks(vec![
            Ok(LLMChunk::Token("Here is a chart ".to_string())),
            Ok(LLMChunk::Image(image.clone())),
            Err(LLMError::Stream("upstream overloaded".to_string())),
        ]),
        tokens(&["and the explanation"]),
    ]);

    let outcome = h
        .controller(StreamConfig::default())
        .generate_response(h.request(None))
        .await
        .unwrap();

    assert!(outcome.fallback_used);
    assert_eq!(outcome.text, "Here is a chart and the explanation");
    assert_eq!(outcome.images, vec![image.clone()]);
    let last = h.platform.latest(&outcome.message_ids[0]).unwrap();
    assert_eq!(last.files, vec![image]);
}
