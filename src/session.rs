//! Session store
//!
//! Keyed, single-writer-per-key storage for conversation state. Each entry
//! sits behind its own `tokio::sync::Mutex`; a caller holds the lock for the
//! whole step, so steps against one session never interleave while distinct
//! sessions run fully concurrently.

use crate::engine::state::{ConversationState, Message, UserIdentity};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    NotFound(String),
}

/// In-memory store of live sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session. Returns its id and greeting.
    pub async fn create(&self) -> (String, String) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let state = ConversationState::new(&session_id);
        let greeting = state.greeting();
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(state)));
        tracing::info!(session = %session_id, "session created");
        (session_id, greeting)
    }

    /// Handle to a session's state. Lock it for the duration of a step.
    pub async fn entry(
        &self,
        session_id: &str,
    ) -> Result<Arc<Mutex<ConversationState>>, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Snapshot of a session's history.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>, SessionError> {
        let entry = self.entry(session_id).await?;
        let state = entry.lock().await;
        Ok(state.history.clone())
    }

    /// Truncate history to a fresh greeting and abandon any pending booking,
    /// even one mid-confirmation. Returns the greeting.
    pub async fn reset(&self, session_id: &str) -> Result<String, SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.reset();
        tracing::info!(session = %session_id, "session reset");
        Ok(state.greeting())
    }

    /// Attach a signed-in identity and greet the user by name.
    pub async fn login(
        &self,
        session_id: &str,
        identity: UserIdentity,
    ) -> Result<String, SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.user = Some(identity);
        let greeting = state.greeting();
        // A conversation still at the greeting gets it rewritten in place;
        // otherwise the personalized greeting is appended.
        if state.history.len() == 1 {
            state.history[0] = Message::assistant(greeting.clone());
        } else {
            state.history.push(Message::assistant(greeting.clone()));
        }
        Ok(greeting)
    }

    /// Detach the identity and clear the conversation.
    pub async fn sign_out(&self, session_id: &str) -> Result<(), SessionError> {
        let entry = self.entry(session_id).await?;
        let mut state = entry.lock().await;
        state.user = None;
        state.reset();
        tracing::info!(session = %session_id, "session signed out");
        Ok(())
    }

    /// Drop a session entirely.
    pub async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{PendingAction, TicketArgs, ToolArgs, ToolCall};

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        assert!(matches!(
            store.entry("nope").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reset_is_idempotent_and_clears_pending() {
        let store = SessionStore::new();
        let (id, _) = store.create().await;

        {
            let entry = store.entry(&id).await.unwrap();
            let mut state = entry.lock().await;
            state.history.push(Message::user("book CY 888"));
            state.pending_action = Some(PendingAction {
                call: ToolCall::new("c1", ToolArgs::InsertTicket(TicketArgs::default())),
            });
        }

        for _ in 0..3 {
            store.reset(&id).await.unwrap();
            let entry = store.entry(&id).await.unwrap();
            let state = entry.lock().await;
            assert_eq!(state.history.len(), 1);
            assert!(state.pending_action.is_none());
        }
    }

    #[tokio::test]
    async fn login_personalizes_greeting_then_sign_out_clears() {
        let store = SessionStore::new();
        let (id, greeting) = store.create().await;
        assert!(!greeting.contains("Alice"));

        let greeting = store
            .login(
                &id,
                UserIdentity {
                    token: "tok".to_string(),
                    name: Some("Alice".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(greeting.contains("Alice"));
        assert_eq!(store.history(&id).await.unwrap().len(), 1);

        store.sign_out(&id).await.unwrap();
        let history = store.history(&id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].text.contains("Alice"));
    }

    // Two sessions never observe each other's history or pending action.
    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = Arc::new(SessionStore::new());
        let (a, _) = store.create().await;
        let (b, _) = store.create().await;

        let mut tasks = Vec::new();
        for (id, text) in [(a.clone(), "alpha"), (b.clone(), "beta")] {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let entry = store.entry(&id).await.unwrap();
                    let mut state = entry.lock().await;
                    state.history.push(Message::user(text));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let history_a = store.history(&a).await.unwrap();
        assert_eq!(history_a.len(), 51);
        assert!(history_a[1..].iter().all(|m| m.text == "alpha"));
        let history_b = store.history(&b).await.unwrap();
        assert!(history_b[1..].iter().all(|m| m.text == "beta"));
    }

    // N concurrent steps against one session produce N serialized history
    // mutations with no lost updates.
    #[tokio::test]
    async fn concurrent_steps_serialize_per_session() {
        let store = Arc::new(SessionStore::new());
        let (id, _) = store.create().await;

        const WRITERS: usize = 16;
        let mut tasks = Vec::new();
        for i in 0..WRITERS {
            let store = store.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                let entry = store.entry(&id).await.unwrap();
                let mut state = entry.lock().await;
                // Two dependent appends with a suspension point between them;
                // interleaving would tear the pair apart.
                let len = state.history.len();
                state.history.push(Message::user(format!("question {i}")));
                tokio::task::yield_now().await;
                assert_eq!(state.history.len(), len + 1);
                state.history.push(Message::assistant(format!("answer {i}")));
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let history = store.history(&id).await.unwrap();
        assert_eq!(history.len(), 1 + WRITERS * 2);
        // Every question is immediately followed by its answer.
        for pair in history[1..].chunks(2) {
            let q = pair[0].text.strip_prefix("question ").unwrap();
            let a = pair[1].text.strip_prefix("answer ").unwrap();
            assert_eq!(q, a);
        }
    }
}
