//! Review Sessions
//!
//! A review session pairs one uploaded document with its viewer controller
//! and chat transcript. Sessions live in memory for the life of the process.

use chrono::{DateTime, Utc};
use financeguard_models::{BackendResponse, ChatMessage, ChatRequest, DocumentSummary};
use financeguard_utils::{validate_model, FinanceGuardError, FinanceGuardResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::{render_response, ChatBackend};
use crate::viewer::{PassOutcome, ViewerController};

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatExchange {
    pub reply: BackendResponse,
    pub message: ChatMessage,
    /// Set when the reply carried highlights and a new pass was run.
    pub pass: Option<PassOutcome>,
}

pub struct ReviewSession {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: u64,
    pub upload_date: DateTime<Utc>,
    pub backend_reference: Option<String>,
    viewer: ViewerController,
    transcript: RwLock<Vec<ChatMessage>>,
    /// One chat turn at a time, so replies apply in the order they were asked.
    turn: Mutex<()>,
}

impl ReviewSession {
    pub fn new(
        filename: impl Into<String>,
        size_bytes: u64,
        backend_reference: Option<String>,
        viewer: ViewerController,
        welcome_message: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            size_bytes,
            upload_date: Utc::now(),
            backend_reference,
            viewer,
            transcript: RwLock::new(vec![ChatMessage::assistant(welcome_message, None)]),
            turn: Mutex::new(()),
        }
    }

    pub fn viewer(&self) -> &ViewerController {
        &self.viewer
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().await.clone()
    }

    pub async fn summary(&self) -> DocumentSummary {
        let snapshot = self.viewer.snapshot().await;
        DocumentSummary {
            document_id: self.id,
            filename: self.filename.clone(),
            size_bytes: self.size_bytes,
            page_count: snapshot.page_count.unwrap_or(0),
            upload_date: self.upload_date,
            backend_reference: self.backend_reference.clone(),
            targets: snapshot.targets,
            match_count: snapshot.matches.len(),
        }
    }

    /// Sends `request` to the backend and records the exchange.
    ///
    /// Highlights in the reply replace the system-detected targets. On error
    /// the transcript and targets are left as they were. Concurrent calls on
    /// one session run one after another.
    pub async fn chat(
        &self,
        backend: &dyn ChatBackend,
        request: ChatRequest,
    ) -> FinanceGuardResult<ChatExchange> {
        validate_model(&request)?;
        let _turn = self.turn.lock().await;
        let reply = backend.chat(&request).await?;
        if reply.is_error() {
            warn!(session = %self.id, kind = reply.kind(), "Backend reported an error status");
        }

        let message = ChatMessage::assistant(render_response(&reply), Some(reply.clone()));
        {
            let mut transcript = self.transcript.write().await;
            transcript.push(ChatMessage::user(request.query));
            transcript.push(message.clone());
        }

        let pass = match reply.highlights() {
            Some(highlights) => Some(self.viewer.set_system_targets(highlights.to_vec()).await),
            None => None,
        };

        info!(
            session = %self.id,
            kind = reply.kind(),
            highlights = reply.highlights().map_or(0, |h| h.len()),
            "Chat reply recorded"
        );
        Ok(ChatExchange { reply, message, pass })
    }
}

/// In-memory registry of review sessions keyed by document id.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<ReviewSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: ReviewSession) -> Arc<ReviewSession> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::clone(&session));
        session
    }

    pub async fn get(&self, id: Uuid) -> FinanceGuardResult<Arc<ReviewSession>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| FinanceGuardError::not_found(format!("Document {}", id)))
    }

    /// Removes the session and releases its document.
    pub async fn remove(&self, id: Uuid) -> FinanceGuardResult<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| FinanceGuardError::not_found(format!("Document {}", id)))?;
        session.viewer.unload().await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::MapperOptions;
    use crate::testing::{FakeDocument, FakePage};
    use async_trait::async_trait;
    use financeguard_models::{ChatRole, HighlightCategory, TextRun};
    use financeguard_utils::RETRY_MESSAGE;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Replies with queued JSON values in order.
    struct ScriptedBackend {
        replies: Mutex<Vec<FinanceGuardResult<serde_json::Value>>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<FinanceGuardResult<serde_json::Value>>) -> Self {
            Self { replies: Mutex::new(replies) }
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn chat(&self, _request: &ChatRequest) -> FinanceGuardResult<BackendResponse> {
            let reply = self.replies.lock().unwrap().remove(0)?;
            Ok(serde_json::from_value(reply).unwrap())
        }
    }

    async fn session() -> ReviewSession {
        let viewer = ViewerController::new(MapperOptions::default());
        viewer
            .load_document(Arc::new(FakeDocument::new(vec![FakePage::with_runs(vec![
                TextRun::new("foo clause", 10.0, 500.0, 50.0, 12.0),
                TextRun::new("bar clause", 10.0, 400.0, 50.0, 12.0),
                TextRun::new("baz clause", 10.0, 300.0, 50.0, 12.0),
            ])])))
            .await;
        ReviewSession::new("prospectus.pdf", 1024, None, viewer, "Welcome")
    }

    #[tokio::test]
    async fn test_reply_highlights_become_system_targets() {
        let session = session().await;
        let backend = ScriptedBackend::new(vec![Ok(serde_json::json!({
            "type": "highlighted_clause",
            "message": "Two clauses matter.",
            "highlights": ["foo", "bar"]
        }))]);

        let exchange = assert_ok!(session.chat(&backend, ChatRequest::new("Which clauses?")).await);
        assert!(exchange.pass.unwrap().is_committed());

        let targets = session.viewer().targets().await;
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.category == HighlightCategory::SystemDetected));
        assert_eq!(session.viewer().matches().await.len(), 2);

        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].role, ChatRole::User);
        assert_eq!(transcript[2].content, "Two clauses matter.");
    }

    #[tokio::test]
    async fn test_reply_without_highlights_keeps_targets() {
        let session = session().await;
        session.viewer().set_system_targets(["baz"]).await;
        let backend = ScriptedBackend::new(vec![Ok(serde_json::json!({
            "type": "simple_dialogue",
            "message": "Hello",
            "status": "success"
        }))]);

        let exchange = assert_ok!(session.chat(&backend, ChatRequest::new("hi")).await);
        assert!(exchange.pass.is_none());
        assert_eq!(session.viewer().targets().await[0].text, "baz");
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_session_untouched() {
        let session = session().await;
        session.viewer().set_system_targets(["foo"]).await;
        let backend = ScriptedBackend::new(vec![Err(FinanceGuardError::external_service(
            "Analysis backend",
            "connection refused",
        ))]);

        let err = assert_err!(session.chat(&backend, ChatRequest::new("hi")).await);
        assert_eq!(err.user_message(), RETRY_MESSAGE);
        assert_eq!(session.transcript().await.len(), 1);
        assert_eq!(session.viewer().matches().await.len(), 1);
    }

    /// Holds the reply to "first" until released; answers anything else at once.
    #[derive(Default)]
    struct SlowFirstBackend {
        calls: std::sync::atomic::AtomicUsize,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl ChatBackend for SlowFirstBackend {
        async fn chat(&self, request: &ChatRequest) -> FinanceGuardResult<BackendResponse> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let highlight = if request.query == "first" {
                self.entered.notify_one();
                self.release.notified().await;
                "foo"
            } else {
                "bar"
            };
            Ok(serde_json::from_value(serde_json::json!({
                "type": "highlighted_clause",
                "message": request.query,
                "highlights": [highlight]
            }))
            .unwrap())
        }
    }

    #[tokio::test]
    async fn test_concurrent_chats_apply_in_request_order() {
        let session = session().await;
        let backend = SlowFirstBackend::default();

        let (first, second) = tokio::join!(session.chat(&backend, ChatRequest::new("first")), async {
            backend.entered.notified().await;
            let second = session.chat(&backend, ChatRequest::new("second"));
            tokio::pin!(second);
            assert!(tokio::time::timeout(std::time::Duration::from_millis(50), &mut second)
                .await
                .is_err());
            assert_eq!(backend.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
            backend.release.notify_one();
            second.await
        });
        assert_ok!(first);
        assert_ok!(second);

        let targets = session.viewer().targets().await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].text, "bar");
        let transcript = session.transcript().await;
        assert_eq!(transcript[1].content, "first");
        assert_eq!(transcript[3].content, "second");
    }

    #[tokio::test]
    async fn test_error_status_reply_is_still_recorded() {
        let session = session().await;
        let backend = ScriptedBackend::new(vec![Ok(serde_json::json!({
            "type": "simple_dialogue",
            "message": "Query not understood",
            "status": "error"
        }))]);

        let exchange = assert_ok!(session.chat(&backend, ChatRequest::new("??")).await);
        assert!(exchange.reply.is_error());
        assert_eq!(session.transcript().await.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let session = session().await;
        let backend = ScriptedBackend::new(Vec::new());
        let err = assert_err!(session.chat(&backend, ChatRequest::new(" ")).await);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let store = SessionStore::new();
        let session = store.insert(session().await).await;
        assert_eq!(store.len().await, 1);

        let summary = store.get(session.id).await.unwrap().summary().await;
        assert_eq!(summary.page_count, 1);
        assert_eq!(summary.filename, "prospectus.pdf");

        store.remove(session.id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(!session.viewer().has_document().await);
        assert!(matches!(
            store.get(session.id).await,
            Err(FinanceGuardError::NotFound { .. })
        ));
    }
}
