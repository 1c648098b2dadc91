use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::common::events::{ChatEvent, SessionEvent};
use crate::common::types::{ChatMessage, PeerAddress, SessionId, SessionInfo, TextStyle};
use crate::error::{ChatError, Result};
use crate::network::peer::{PeerFactory, PeerHandle};
use crate::session::transfer::{FileTransfer, TransferInvitation};

/// Per-peer outcome of one fan-out. A failed delivery to one peer never
/// blocks delivery to the rest.
pub type DeliveryReport = Vec<(PeerAddress, Result<()>)>;

/// One conversation between the local peer and one or more remote peers.
///
/// The roster is a single map from participant address to its resolved
/// [`PeerHandle`], so the participant set and the handle set cannot drift
/// apart. Once a session has grown past one remote participant it counts as
/// a group session for the rest of its life, even when peers leave again.
pub struct ChatSession {
    id: SessionId,
    local_user: PeerAddress,
    factory: Arc<dyn PeerFactory>,
    events: mpsc::Sender<SessionEvent>,
    roster: Mutex<HashMap<PeerAddress, Arc<dyn PeerHandle>>>,
    group: AtomicBool,
}

impl ChatSession {
    pub fn new(
        id: SessionId,
        local_user: PeerAddress,
        remote_users: impl IntoIterator<Item = PeerAddress>,
        factory: Arc<dyn PeerFactory>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let mut roster = HashMap::new();
        for address in remote_users {
            if address == local_user {
                continue;
            }
            let handle = factory.connect(&address);
            roster.insert(address, handle);
        }
        let group = AtomicBool::new(roster.len() > 1);
        Self {
            id,
            local_user,
            factory,
            events,
            roster: Mutex::new(roster),
            group,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn local_user(&self) -> &PeerAddress {
        &self.local_user
    }

    pub fn is_group(&self) -> bool {
        self.group.load(Ordering::SeqCst)
    }

    pub fn participants(&self) -> Vec<PeerAddress> {
        self.roster.lock().unwrap().keys().cloned().collect()
    }

    fn is_participant(&self, address: &PeerAddress) -> bool {
        self.roster.lock().unwrap().contains_key(address)
    }

    /// The single remote peer of a pairwise session (any current peer once
    /// the session has grown into a group).
    fn primary_peer(&self) -> Option<Arc<dyn PeerHandle>> {
        self.roster.lock().unwrap().values().next().cloned()
    }

    /// Fans `call` out to every current participant. The roster is
    /// snapshotted under the lock first so no remote call runs while the
    /// lock is held; per-peer failures are logged and reported, never
    /// propagated.
    async fn broadcast<F, Fut>(&self, call: F) -> DeliveryReport
    where
        F: Fn(Arc<dyn PeerHandle>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let targets: Vec<(PeerAddress, Arc<dyn PeerHandle>)> = {
            let roster = self.roster.lock().unwrap();
            roster
                .iter()
                .map(|(address, handle)| (address.clone(), Arc::clone(handle)))
                .collect()
        };

        let mut report = Vec::with_capacity(targets.len());
        for (address, handle) in targets {
            let outcome = call(handle).await;
            if let Err(err) = &outcome {
                log::warn!("Session {}: call to {address} failed: {err}", self.id);
            }
            report.push((address, outcome));
        }
        report
    }

    /// Merges new addresses into the roster, resolving a handle for each.
    /// Returns whether this merge made the session a group.
    fn add_participants(&self, addresses: &[PeerAddress]) -> bool {
        let mut roster = self.roster.lock().unwrap();
        for address in addresses {
            if *address == self.local_user || roster.contains_key(address) {
                continue;
            }
            let handle = self.factory.connect(address);
            roster.insert(address.clone(), handle);
        }
        if roster.len() > 1 {
            !self.group.swap(true, Ordering::SeqCst)
        } else {
            false
        }
    }

    pub async fn send_message(&self, style: TextStyle, text: impl Into<String>) -> DeliveryReport {
        let session = self.id;
        let sender = self.local_user.clone();
        let text = text.into();
        self.broadcast(move |handle| {
            let sender = sender.clone();
            let style = style.clone();
            let text = text.clone();
            async move { handle.receive_message(session, sender, style, text).await }
        })
        .await
    }

    pub async fn send_buzz(&self) -> DeliveryReport {
        let session = self.id;
        let sender = self.local_user.clone();
        self.broadcast(move |handle| {
            let sender = sender.clone();
            async move { handle.buzz(session, sender).await }
        })
        .await
    }

    pub async fn notify_typing(&self) -> DeliveryReport {
        let session = self.id;
        let sender = self.local_user.clone();
        self.broadcast(move |handle| {
            let sender = sender.clone();
            async move { handle.user_is_typing(session, sender).await }
        })
        .await
    }

    /// Offers a file to the single remote peer. File transfer is
    /// pairwise-only; in a group session this fails without side effects.
    pub async fn send_file(
        &self,
        name: impl Into<String>,
        content: Vec<u8>,
    ) -> Result<FileTransfer> {
        if self.is_group() {
            return Err(ChatError::InvalidState(
                "cannot send files in a group chat session",
            ));
        }
        let peer = self
            .primary_peer()
            .ok_or(ChatError::InvalidState("session has no participants"))?;
        let transfer = FileTransfer::new(self.id, peer, self.local_user.clone(), name, content);
        transfer.start().await?;
        Ok(transfer)
    }

    /// Invites another peer into this conversation, carrying our current
    /// roster. Local state only changes once the peer's join is observed.
    pub async fn invite(&self, address: &PeerAddress) -> Result<()> {
        let handle = self.factory.connect(address);
        handle
            .receive_chat_invite(self.id, self.local_user.clone(), self.participants())
            .await
    }

    /// Best-effort goodbye: tells every peer we are leaving (failures
    /// suppressed) and then unconditionally announces session end.
    pub async fn end(&self) {
        let session = self.id;
        let sender = self.local_user.clone();
        self.broadcast(move |handle| {
            let sender = sender.clone();
            async move { handle.leave_chat(session, sender).await }
        })
        .await;
        let _ = self
            .events
            .send(SessionEvent::SessionEnded { session: self.id })
            .await;
    }

    /// Asks the primary peer for the current roster and merges any
    /// participants we did not know about. Errors are swallowed: the remote
    /// side may simply be gone.
    pub async fn update_session_info(&self) {
        let Some(peer) = self.primary_peer() else {
            return;
        };
        match peer.get_session_info(self.id, self.local_user.clone()).await {
            Ok(info) => {
                if self.add_participants(&info.participants) {
                    let _ = self
                        .events
                        .send(SessionEvent::GroupStarted { session: self.id })
                        .await;
                }
            }
            Err(err) => {
                log::warn!("Session {}: could not refresh session info: {err}", self.id);
            }
        }
    }

    /// Reacts to one inbound event from the local message bus. Message,
    /// typing, buzz and transfer-invite events from non-participants are
    /// dropped silently.
    pub async fn handle_event(&self, event: ChatEvent) {
        match event {
            ChatEvent::MessageReceived {
                session,
                from,
                style,
                text,
            } => {
                if !self.is_participant(&from) {
                    log::debug!("Session {session}: dropping message from non-participant {from}");
                    return;
                }
                let message = ChatMessage {
                    id: Uuid::new_v4().to_string(),
                    session,
                    sender: from,
                    style,
                    text,
                    timestamp: Utc::now().timestamp(),
                };
                let _ = self
                    .events
                    .send(SessionEvent::MessageReceived(message))
                    .await;
            }
            ChatEvent::TypingReceived { session, from } => {
                if self.is_participant(&from) {
                    let _ = self
                        .events
                        .send(SessionEvent::UserTyping {
                            session,
                            user: from,
                        })
                        .await;
                }
            }
            ChatEvent::BuzzReceived { session, from } => {
                if self.is_participant(&from) {
                    let _ = self
                        .events
                        .send(SessionEvent::BuzzReceived {
                            session,
                            user: from,
                        })
                        .await;
                }
            }
            ChatEvent::UserJoined { session, from } => {
                // Idempotent: re-announcing an existing participant is a no-op.
                let added = {
                    let mut roster = self.roster.lock().unwrap();
                    if roster.contains_key(&from) || from == self.local_user {
                        false
                    } else {
                        let handle = self.factory.connect(&from);
                        roster.insert(from.clone(), handle);
                        if roster.len() > 1 {
                            self.group.store(true, Ordering::SeqCst);
                        }
                        true
                    }
                };
                if added {
                    let _ = self
                        .events
                        .send(SessionEvent::UserJoined {
                            session,
                            user: from,
                        })
                        .await;
                }
            }
            ChatEvent::UserLeft { session, from } => {
                // Leaving a pairwise session is End(), not a leave event.
                if !self.is_group() {
                    return;
                }
                let removed = self.roster.lock().unwrap().remove(&from).is_some();
                if removed {
                    let _ = self
                        .events
                        .send(SessionEvent::UserLeft {
                            session,
                            user: from,
                        })
                        .await;
                }
            }
            ChatEvent::InviteReceived {
                session,
                from,
                participants,
            } => {
                if self.is_group() {
                    return;
                }
                log::info!(
                    "Session {session}: invite from {from} carrying {} participant(s)",
                    participants.len()
                );
                self.add_participants(&participants);
                // Announce ourselves to everyone now in the conversation;
                // the invite stays accepted even if some peers are
                // unreachable.
                let id = self.id;
                let sender = self.local_user.clone();
                self.broadcast(move |handle| {
                    let sender = sender.clone();
                    async move { handle.join_chat(id, sender).await }
                })
                .await;
                let _ = self
                    .events
                    .send(SessionEvent::GroupStarted { session: self.id })
                    .await;
            }
            ChatEvent::TransferInviteReceived {
                session,
                from,
                request,
            } => {
                if self.is_group() {
                    return;
                }
                let handle = self.roster.lock().unwrap().get(&from).cloned();
                let Some(handle) = handle else {
                    log::debug!(
                        "Session {session}: dropping transfer invite from non-participant {from}"
                    );
                    return;
                };
                let invitation = TransferInvitation::new(request, from.clone(), handle);
                let _ = self
                    .events
                    .send(SessionEvent::TransferInviteReceived {
                        session,
                        user: from,
                        invitation,
                    })
                    .await;
            }
            ChatEvent::SessionInfoRequested { from, reply, .. } => {
                let participants = self
                    .participants()
                    .into_iter()
                    .filter(|address| *address != from)
                    .collect();
                let _ = reply.send(SessionInfo { participants });
            }
        }
    }
}

impl PartialEq for ChatSession {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatSession {}

impl Hash for ChatSession {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("local_user", &self.local_user)
            .field("group", &self.is_group())
            .finish()
    }
}
