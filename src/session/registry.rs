use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::common::events::{ChatEvent, SessionEvent};
use crate::common::types::{PeerAddress, SessionId};
use crate::network::peer::PeerFactory;
use crate::session::chat::ChatSession;

/// Owns the conversation map: one [`ChatSession`] per session id, created
/// lazily when a previously unseen session shows chat-relevant activity, or
/// explicitly by the local user starting a conversation.
pub struct SessionRegistry {
    local_user: PeerAddress,
    factory: Arc<dyn PeerFactory>,
    events: mpsc::Sender<SessionEvent>,
    sessions: Mutex<HashMap<SessionId, Arc<ChatSession>>>,
}

impl SessionRegistry {
    pub fn new(
        local_user: PeerAddress,
        factory: Arc<dyn PeerFactory>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            local_user,
            factory,
            events,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a fresh pairwise conversation towards `remote`.
    pub fn start_session(&self, remote: PeerAddress) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::new(
            SessionId::new(),
            self.local_user.clone(),
            vec![remote],
            Arc::clone(&self.factory),
            self.events.clone(),
        ));
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id(), Arc::clone(&session));
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<ChatSession>> {
        self.sessions.lock().unwrap().get(&id).cloned()
    }

    /// Forgets a session. The owner calls this after session-ended or once
    /// the last participant has left; the registry never ends sessions
    /// itself.
    pub fn remove(&self, id: SessionId) -> Option<Arc<ChatSession>> {
        self.sessions.lock().unwrap().remove(&id)
    }

    /// Routes one inbound bus event to its session. Message, buzz, invite
    /// and transfer-invite activity from an unseen session creates the
    /// session first (announced via [`SessionEvent::ChatStarted`]); join,
    /// leave and roster requests for unknown sessions are dropped.
    pub async fn dispatch(&self, event: ChatEvent) {
        let id = event.session();
        // Lookup-or-create in one critical section so two racing first
        // events for the same session id cannot both create it.
        let (session, created) = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.entry(id) {
                Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
                Entry::Vacant(entry) => {
                    if !starts_a_session(&event) {
                        log::debug!("Dropping {event:?} for unknown session {id}");
                        return;
                    }
                    let session = Arc::new(ChatSession::new(
                        id,
                        self.local_user.clone(),
                        vec![event.sender().clone()],
                        Arc::clone(&self.factory),
                        self.events.clone(),
                    ));
                    entry.insert(Arc::clone(&session));
                    (session, true)
                }
            }
        };
        if created {
            log::info!("New chat session {id} started by {}", event.sender());
            let _ = self
                .events
                .send(SessionEvent::ChatStarted {
                    session: Arc::clone(&session),
                })
                .await;
        }
        session.handle_event(event).await;
    }
}

/// Only actual chat activity conjures a session out of nothing.
fn starts_a_session(event: &ChatEvent) -> bool {
    matches!(
        event,
        ChatEvent::MessageReceived { .. }
            | ChatEvent::BuzzReceived { .. }
            | ChatEvent::InviteReceived { .. }
            | ChatEvent::TransferInviteReceived { .. }
    )
}
