use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::common::events::PresenceEvent;
use crate::common::types::{PeerAddress, UserInfo};
use crate::error::{ChatError, Result};
use crate::network::presence::{PresenceChannel, PresenceMessage};

/// Fixed slack added to the loss threshold so one delayed or dropped
/// heartbeat does not flag a peer as gone.
const LOSS_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    Alive(Instant),
    Lost,
}

#[derive(Debug, Clone)]
struct TrackedPeer {
    user: UserInfo,
    state: Liveness,
}

type PeerTable = Arc<Mutex<HashMap<PeerAddress, TrackedPeer>>>;

/// Turns raw heartbeat traffic into discovery/loss notifications.
///
/// Every tracked peer lives in a single lock-protected table as either
/// `Alive(last_seen)` or `Lost`, so each transition is one atomic update and
/// a peer can never be in both states at once. A peer is declared lost when
/// it has been silent for more than twice its own declared heartbeat
/// interval plus [`LOSS_SLACK`].
pub struct PresenceService {
    channel: Arc<dyn PresenceChannel>,
    local_user: UserInfo,
    interval: Duration,
    peers: PeerTable,
    events: mpsc::Sender<PresenceEvent>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceService {
    pub fn new(
        channel: Arc<dyn PresenceChannel>,
        local_user: UserInfo,
        interval: Duration,
        events: mpsc::Sender<PresenceEvent>,
    ) -> Self {
        Self {
            channel,
            local_user,
            interval,
            peers: Arc::new(Mutex::new(HashMap::new())),
            events,
            worker: Mutex::new(None),
        }
    }

    /// Arms the heartbeat timer and starts consuming the presence channel.
    /// The first action of every tick is announcing ourselves.
    pub fn start(&self, incoming: mpsc::Receiver<PresenceMessage>) -> Result<()> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return Err(ChatError::InvalidState("presence service already started"));
        }

        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.channel),
            self.local_user.clone(),
            self.interval,
            Arc::clone(&self.peers),
            self.events.clone(),
            incoming,
        ));
        *worker = Some(handle);
        log::info!(
            "Presence service started for {} (interval {:?})",
            self.local_user.id,
            self.interval
        );
        Ok(())
    }

    /// Broadcasts one heartbeat carrying the local identity.
    pub async fn im_alive(&self) -> Result<()> {
        send_keep_alive(self.channel.as_ref(), &self.local_user).await
    }

    /// Starts tracking a peer we have not necessarily heard from yet (e.g.
    /// when a chat session is opened towards it). No discovery event fires.
    pub fn monitor_user(&self, user: UserInfo) {
        let mut peers = self.peers.lock().unwrap();
        peers.insert(
            user.id.clone(),
            TrackedPeer {
                user,
                state: Liveness::Alive(Instant::now()),
            },
        );
    }

    /// Stops tracking a peer. Silent no-op if it was never tracked.
    pub fn leave_user(&self, address: &PeerAddress) {
        self.peers.lock().unwrap().remove(address);
    }

    /// Detaches from the channel, halts the timer and forgets every peer.
    /// Safe to call repeatedly.
    pub fn stop(&self) {
        if let Some(handle) = self.worker.lock().unwrap().take() {
            handle.abort();
            log::info!("Presence service stopped for {}", self.local_user.id);
        }
        self.peers.lock().unwrap().clear();
    }

    pub fn is_alive(&self, address: &PeerAddress) -> bool {
        matches!(
            self.peers.lock().unwrap().get(address).map(|p| p.state),
            Some(Liveness::Alive(_))
        )
    }

    pub fn alive_users(&self) -> Vec<UserInfo> {
        self.peers
            .lock()
            .unwrap()
            .values()
            .filter(|p| matches!(p.state, Liveness::Alive(_)))
            .map(|p| p.user.clone())
            .collect()
    }

    pub fn lost_users(&self) -> Vec<UserInfo> {
        self.peers
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.state == Liveness::Lost)
            .map(|p| p.user.clone())
            .collect()
    }
}

impl Drop for PresenceService {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().unwrap().take() {
            handle.abort();
        }
    }
}

async fn run_loop(
    channel: Arc<dyn PresenceChannel>,
    local_user: UserInfo,
    interval: Duration,
    peers: PeerTable,
    events: mpsc::Sender<PresenceEvent>,
    mut incoming: mpsc::Receiver<PresenceMessage>,
) {
    let mut ticker = time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = send_keep_alive(channel.as_ref(), &local_user).await {
                    log::warn!("Failed to broadcast keep-alive: {err}");
                }

                let gone = sweep(&peers, Instant::now());
                for user in gone {
                    log::info!("Peer {} timed out", user.id);
                    let _ = events.send(PresenceEvent::UserLost(user)).await;
                }
            }
            message = incoming.recv() => {
                match message {
                    Some(PresenceMessage::KeepAlive(user)) => {
                        // Our own broadcast loops back on the rendezvous.
                        if user.id == local_user.id {
                            continue;
                        }
                        if let Some(event) = record_heartbeat(&peers, user, Instant::now()) {
                            let _ = events.send(event).await;
                        }
                    }
                    Some(PresenceMessage::Logout(address)) => {
                        peers.lock().unwrap().remove(&address);
                    }
                    None => break,
                }
            }
        }
    }
}

/// One heartbeat announcing `user`, shared by [`PresenceService::im_alive`]
/// and the tick of the worker loop.
async fn send_keep_alive(channel: &dyn PresenceChannel, user: &UserInfo) -> Result<()> {
    channel
        .send_message(PresenceMessage::KeepAlive(user.clone()))
        .await
}

/// Registers one heartbeat. A brand-new peer is a first sighting and yields
/// `UserDiscovered`; a known peer (lost or not) only gets its record
/// refreshed.
fn record_heartbeat(peers: &PeerTable, user: UserInfo, now: Instant) -> Option<PresenceEvent> {
    let mut table = peers.lock().unwrap();
    match table.get_mut(&user.id) {
        Some(entry) => {
            entry.user = user;
            entry.state = Liveness::Alive(now);
            None
        }
        None => {
            log::info!("Discovered peer {}", user.id);
            table.insert(
                user.id.clone(),
                TrackedPeer {
                    user: user.clone(),
                    state: Liveness::Alive(now),
                },
            );
            Some(PresenceEvent::UserDiscovered(user))
        }
    }
}

/// Marks every alive peer whose silence exceeds its loss threshold as lost
/// and returns them. Each peer is considered at most once per call.
fn sweep(peers: &PeerTable, now: Instant) -> Vec<UserInfo> {
    let mut table = peers.lock().unwrap();
    let mut gone = Vec::new();
    for entry in table.values_mut() {
        if let Liveness::Alive(last_seen) = entry.state {
            let threshold = entry.user.keep_alive_interval * 2 + LOSS_SLACK;
            if now.duration_since(last_seen) > threshold {
                entry.state = Liveness::Lost;
                gone.push(entry.user.clone());
            }
        }
    }
    gone
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<PresenceMessage>>,
    }

    #[async_trait]
    impl PresenceChannel for RecordingChannel {
        async fn send_message(&self, message: PresenceMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn user(port: u16, keep_alive_secs: u64) -> UserInfo {
        UserInfo {
            id: PeerAddress::new("192.168.0.7", port),
            presence_endpoint: PeerAddress::new("192.168.0.7", port + 1),
            keep_alive_interval: Duration::from_secs(keep_alive_secs),
        }
    }

    fn empty_table() -> PeerTable {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[test]
    fn first_heartbeat_is_a_discovery_and_creates_the_record() {
        let peers = empty_table();
        let now = Instant::now();

        let event = record_heartbeat(&peers, user(9000, 2), now);
        assert_eq!(event, Some(PresenceEvent::UserDiscovered(user(9000, 2))));
        assert!(peers.lock().unwrap().contains_key(&user(9000, 2).id));
    }

    #[test]
    fn repeated_heartbeat_only_refreshes() {
        let peers = empty_table();
        let now = Instant::now();

        record_heartbeat(&peers, user(9000, 2), now);
        let event = record_heartbeat(&peers, user(9000, 2), now + Duration::from_secs(1));
        assert_eq!(event, None);
    }

    #[test]
    fn peer_is_lost_only_after_twice_its_interval_plus_slack() {
        let peers = empty_table();
        let now = Instant::now();
        record_heartbeat(&peers, user(9000, 2), now);

        // threshold = 2*2s + 5s = 9s; at exactly 9s the peer is still alive
        assert!(sweep(&peers, now + Duration::from_secs(9)).is_empty());

        let gone = sweep(&peers, now + Duration::from_millis(9_001));
        assert_eq!(gone, vec![user(9000, 2)]);

        // already lost peers are not reported again
        assert!(sweep(&peers, now + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn lost_peer_reappearing_is_not_rediscovered() {
        let peers = empty_table();
        let now = Instant::now();
        record_heartbeat(&peers, user(9000, 2), now);
        sweep(&peers, now + Duration::from_secs(20));

        let event = record_heartbeat(&peers, user(9000, 2), now + Duration::from_secs(21));
        assert_eq!(event, None);
        assert!(matches!(
            peers.lock().unwrap()[&user(9000, 2).id].state,
            Liveness::Alive(_)
        ));
    }

    #[tokio::test]
    async fn monitor_and_leave_track_explicitly() {
        let (events_tx, _events_rx) = mpsc::channel(16);
        let service = PresenceService::new(
            Arc::new(RecordingChannel::default()),
            user(9000, 2),
            Duration::from_secs(2),
            events_tx,
        );

        let remote = user(9010, 2);
        service.monitor_user(remote.clone());
        assert!(service.is_alive(&remote.id));
        assert_eq!(service.alive_users(), vec![remote.clone()]);

        service.leave_user(&remote.id);
        assert!(!service.is_alive(&remote.id));
        assert!(service.alive_users().is_empty());
        // leaving an untracked peer is a no-op
        service.leave_user(&remote.id);
    }

    #[tokio::test]
    async fn double_start_is_an_invalid_state() {
        let (events_tx, _events_rx) = mpsc::channel(16);
        let service = PresenceService::new(
            Arc::new(RecordingChannel::default()),
            user(9000, 2),
            Duration::from_secs(2),
            events_tx,
        );

        let (_in_tx, in_rx) = mpsc::channel(16);
        service.start(in_rx).unwrap();

        let (_in_tx2, in_rx2) = mpsc::channel(16);
        assert!(matches!(
            service.start(in_rx2),
            Err(ChatError::InvalidState(_))
        ));
        service.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn started_service_discovers_then_loses_a_silent_peer() {
        let channel = Arc::new(RecordingChannel::default());
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let service = PresenceService::new(
            Arc::clone(&channel) as Arc<dyn PresenceChannel>,
            user(9000, 1),
            Duration::from_secs(1),
            events_tx,
        );

        let (in_tx, in_rx) = mpsc::channel(16);
        service.start(in_rx).unwrap();

        let remote = user(9010, 2);
        in_tx
            .send(PresenceMessage::KeepAlive(remote.clone()))
            .await
            .unwrap();
        assert_eq!(
            events_rx.recv().await,
            Some(PresenceEvent::UserDiscovered(remote.clone()))
        );

        // silent for 8s: below the 9s threshold, nothing reported
        time::sleep(Duration::from_secs(8)).await;
        assert!(events_rx.try_recv().is_err());

        // past the threshold the next tick reports the loss
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            events_rx.recv().await,
            Some(PresenceEvent::UserLost(remote.clone()))
        );

        // ticks kept announcing us the whole time
        assert!(channel.sent.lock().unwrap().len() > 1);
        service.stop();
    }

    #[tokio::test]
    async fn im_alive_broadcasts_exactly_one_keep_alive() {
        let channel = Arc::new(RecordingChannel::default());
        let (events_tx, _events_rx) = mpsc::channel(16);
        let local = user(9000, 2);
        let service = PresenceService::new(
            Arc::clone(&channel) as Arc<dyn PresenceChannel>,
            local.clone(),
            Duration::from_secs(2),
            events_tx,
        );

        service.im_alive().await.unwrap();

        let sent = channel.sent.lock().unwrap();
        match sent.as_slice() {
            [PresenceMessage::KeepAlive(announced)] => assert_eq!(announced.id, local.id),
            other => panic!("expected one keep-alive, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn logout_untracks_without_any_event() {
        let channel = Arc::new(RecordingChannel::default());
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let service = PresenceService::new(
            Arc::clone(&channel) as Arc<dyn PresenceChannel>,
            user(9000, 1),
            Duration::from_secs(1),
            events_tx,
        );

        let (in_tx, in_rx) = mpsc::channel(16);
        service.start(in_rx).unwrap();

        let remote = user(9010, 2);
        in_tx
            .send(PresenceMessage::KeepAlive(remote.clone()))
            .await
            .unwrap();
        assert_eq!(
            events_rx.recv().await,
            Some(PresenceEvent::UserDiscovered(remote.clone()))
        );

        in_tx
            .send(PresenceMessage::Logout(remote.id.clone()))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(10)).await;
        assert!(!service.is_alive(&remote.id));
        assert!(service.alive_users().is_empty());
        assert!(service.lost_users().is_empty());

        // long silence afterwards: the signed-off peer is never reported lost
        time::sleep(Duration::from_secs(30)).await;
        assert!(events_rx.try_recv().is_err());
        service.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_service_ignores_further_heartbeats() {
        let channel = Arc::new(RecordingChannel::default());
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let service = PresenceService::new(
            channel,
            user(9000, 1),
            Duration::from_secs(1),
            events_tx,
        );

        let (in_tx, in_rx) = mpsc::channel(16);
        service.start(in_rx).unwrap();
        service.stop();
        assert!(service.alive_users().is_empty());

        let _ = in_tx.send(PresenceMessage::KeepAlive(user(9010, 2))).await;
        time::sleep(Duration::from_secs(5)).await;
        assert!(events_rx.try_recv().is_err());

        // stop is idempotent
        service.stop();
    }
}
