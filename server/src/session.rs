//! The session actor. Owns the registry, mutator and router; every connection
//! talks to it only through [`SessionCommand`]s, so all state changes happen
//! one at a time on this task.

use crate::mutator::StateMutator;
use crate::protocol::{ClientMsg, PlayerId, ServerMsg, WelcomeMsg, PROTOCOL_VERSION};
use crate::registry::Registry;
use crate::router::BroadcastRouter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_shared::config::ArenaConfig;
use tokio::sync::{mpsc, oneshot};

/// Commands from client connections to the session
pub enum SessionCommand {
    Join {
        outbox: mpsc::Sender<ServerMsg>,
        response: oneshot::Sender<PlayerId>,
    },
    Leave {
        id: PlayerId,
    },
    Event {
        sender: PlayerId,
        msg: ClientMsg,
    },
}

pub struct Session {
    registry: Registry,
    mutator: StateMutator,
    router: BroadcastRouter,
    next_seq: u64,
    /// Per-process salt so ids differ across restarts
    id_salt: u32,
}

impl Session {
    pub fn new(arena: ArenaConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let registry_rng = ChaCha8Rng::seed_from_u64(rng.gen());
        let mutator_rng = ChaCha8Rng::seed_from_u64(rng.gen());
        Self {
            registry: Registry::new(arena.max_health, registry_rng),
            mutator: StateMutator::new(arena, mutator_rng),
            router: BroadcastRouter::new(),
            next_seq: 1,
            id_salt: rng.gen(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join { outbox, response } => {
                if let Some(id) = self.connect(outbox) {
                    // The connection may have gone away while waiting
                    if response.send(id.clone()).is_err() {
                        self.disconnect(&id);
                    }
                }
            }
            SessionCommand::Leave { id } => self.disconnect(&id),
            SessionCommand::Event { sender, msg } => self.dispatch(&sender, msg),
        }
    }

    /// Register a new connection and introduce it to everyone.
    pub fn connect(&mut self, outbox: mpsc::Sender<ServerMsg>) -> Option<PlayerId> {
        let id = self.allocate_id();
        let player = match self.registry.register(id.clone()) {
            Ok(player) => player,
            Err(e) => {
                tracing::error!("Failed to register connection: {}", e);
                return None;
            }
        };
        self.router.attach(id.clone(), outbox);

        let mut lagging = self.router.to_one(
            &id,
            ServerMsg::Welcome(WelcomeMsg {
                protocol_version: PROTOCOL_VERSION,
                server_version: env!("CARGO_PKG_VERSION").to_string(),
                self_id: id.clone(),
            }),
        );
        lagging.extend(
            self.router
                .to_one(&id, ServerMsg::Players(self.registry.snapshot())),
        );
        lagging.extend(
            self.router
                .to_all_except(&id, &ServerMsg::PlayerJoined(player.to_wire())),
        );

        tracing::info!(
            "Player {} joined ({} connected)",
            id,
            self.router.peer_count()
        );
        for p in self.registry.all() {
            tracing::debug!(
                "- {}: position {:?}, health {}",
                p.id,
                p.position.to_array(),
                p.health
            );
        }
        self.evict(lagging);
        self.registry.contains(&id).then_some(id)
    }

    /// Drop a connection. Only the first call for an id announces the departure.
    pub fn disconnect(&mut self, id: &PlayerId) {
        let lagging = self.remove_peer(id);
        self.evict(lagging);
    }

    pub fn dispatch(&mut self, sender: &PlayerId, msg: ClientMsg) {
        tracing::trace!("{} from {}", msg.event_name(), sender);
        let mut lagging = Vec::new();
        for out in self.mutator.apply(&mut self.registry, sender, msg) {
            lagging.extend(self.router.dispatch(out));
        }
        self.evict(lagging);
    }

    /// Disconnect peers that could not keep up. Each departure is itself
    /// broadcast, which may overflow further outboxes.
    fn evict(&mut self, mut lagging: Vec<PlayerId>) {
        while let Some(id) = lagging.pop() {
            if self.registry.contains(&id) {
                tracing::warn!("Player {} is lagging, disconnecting", id);
                lagging.extend(self.remove_peer(&id));
            }
        }
    }

    /// Dropping the outbox sender closes the connection's socket.
    fn remove_peer(&mut self, id: &PlayerId) -> Vec<PlayerId> {
        self.router.detach(id);
        if self.registry.remove(id).is_none() {
            return Vec::new();
        }
        let lagging = self.router.to_all(&ServerMsg::PlayerLeft(id.clone()));
        tracing::info!(
            "Player {} left ({} connected)",
            id,
            self.registry.count()
        );
        lagging
    }

    fn allocate_id(&mut self) -> PlayerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        PlayerId(format!("{:x}-{:08x}", seq, self.id_salt))
    }
}

/// Run the session actor until every command sender is gone.
pub async fn run_session(
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    arena: ArenaConfig,
    seed: u64,
) {
    let mut session = Session::new(arena, seed);
    while let Some(cmd) = cmd_rx.recv().await {
        session.handle(cmd);
    }
    tracing::info!("Session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        AsteroidDestroyedMsg, PlayerDamagedMsg, PlayerScoreMsg, UpdatePositionMsg,
    };
    use std::collections::HashSet;

    struct Client {
        id: PlayerId,
        rx: mpsc::Receiver<ServerMsg>,
    }

    impl Client {
        fn drain(&mut self) -> Vec<ServerMsg> {
            let mut msgs = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                msgs.push(msg);
            }
            msgs
        }

        fn events(&mut self) -> Vec<&'static str> {
            self.drain().iter().map(ServerMsg::event_name).collect()
        }
    }

    fn join(session: &mut Session) -> Client {
        let (tx, rx) = mpsc::channel(64);
        let id = session.connect(tx).unwrap();
        Client { id, rx }
    }

    fn test_session() -> Session {
        Session::new(ArenaConfig::default(), 12345)
    }

    #[test]
    fn new_connection_gets_welcome_then_roster() {
        let mut session = test_session();
        let mut a = join(&mut session);
        let mut b = join(&mut session);

        let msgs = b.drain();
        assert_eq!(msgs.len(), 2);
        match &msgs[0] {
            ServerMsg::Welcome(w) => assert_eq!(w.self_id, b.id),
            other => panic!("Expected Welcome, got {:?}", other),
        }
        match &msgs[1] {
            ServerMsg::Players(players) => {
                let ids: Vec<_> = players.iter().map(|p| p.id.clone()).collect();
                assert_eq!(ids, vec![a.id.clone(), b.id.clone()]);
            }
            other => panic!("Expected Players, got {:?}", other),
        }

        assert_eq!(a.events(), vec!["welcome", "players", "playerJoined"]);
    }

    #[test]
    fn connects_yield_unique_ids() {
        let mut session = test_session();
        let clients: Vec<_> = (0..20).map(|_| join(&mut session)).collect();
        let ids: HashSet<_> = clients.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 20);
        assert_eq!(session.registry().count(), 20);
    }

    #[test]
    fn ids_are_not_reused_after_disconnect() {
        let mut session = test_session();
        let a = join(&mut session);
        session.disconnect(&a.id);
        let b = join(&mut session);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn disconnect_announces_once_and_leaves_roster() {
        let mut session = test_session();
        let mut a = join(&mut session);
        let d = join(&mut session);
        a.drain();

        session.handle(SessionCommand::Leave { id: d.id.clone() });
        session.handle(SessionCommand::Leave { id: d.id.clone() });

        assert_eq!(a.drain(), vec![ServerMsg::PlayerLeft(d.id.clone())]);

        let mut e = join(&mut session);
        match &e.drain()[1] {
            ServerMsg::Players(players) => {
                assert!(players.iter().all(|p| p.id != d.id));
                assert_eq!(players.len(), 2);
            }
            other => panic!("Expected Players, got {:?}", other),
        }
    }

    #[test]
    fn late_event_after_disconnect_is_dropped() {
        let mut session = test_session();
        let mut a = join(&mut session);
        let d = join(&mut session);
        session.disconnect(&d.id);
        a.drain();

        session.handle(SessionCommand::Event {
            sender: d.id.clone(),
            msg: ClientMsg::UpdatePosition(UpdatePositionMsg {
                position: [1.0, 2.0, 3.0],
                rotation: [0.0, 0.0, 0.0],
                throttle: None,
            }),
        });
        assert!(a.drain().is_empty());
    }

    #[test]
    fn position_update_reaches_everyone_but_sender() {
        let mut session = test_session();
        let mut a = join(&mut session);
        let mut b = join(&mut session);
        let mut c = join(&mut session);
        a.drain();
        b.drain();
        c.drain();

        session.dispatch(
            &a.id,
            ClientMsg::UpdatePosition(UpdatePositionMsg {
                position: [5.0, 0.0, 0.0],
                rotation: [0.0, 1.0, 0.0],
                throttle: Some(20),
            }),
        );
        assert!(a.drain().is_empty());
        assert_eq!(b.events(), vec!["playerMoved"]);
        assert_eq!(c.events(), vec!["playerMoved"]);
    }

    #[test]
    fn elimination_fans_out_to_the_right_clients() {
        let mut session = test_session();
        let mut victim = join(&mut session);
        let mut attacker = join(&mut session);
        let mut bystander = join(&mut session);
        victim.drain();
        attacker.drain();
        bystander.drain();

        session.dispatch(
            &victim.id,
            ClientMsg::PlayerDamaged(PlayerDamagedMsg {
                amount: 100,
                source_id: Some(attacker.id.clone()),
            }),
        );

        assert_eq!(
            victim.events(),
            vec!["playerEliminated", "respawn", "playerHealthUpdated"]
        );
        assert_eq!(
            attacker.events(),
            vec!["playerEliminated", "scoreUpdated", "playerHealthUpdated"]
        );
        assert_eq!(
            bystander.events(),
            vec!["playerEliminated", "playerHealthUpdated"]
        );
    }

    #[test]
    fn asteroid_score_broadcast_includes_sender() {
        let mut session = test_session();
        let mut c = join(&mut session);
        let mut other = join(&mut session);
        c.drain();
        other.drain();

        session.dispatch(
            &c.id,
            ClientMsg::AsteroidDestroyed(AsteroidDestroyedMsg { points: 15 }),
        );
        let expected = ServerMsg::PlayerScoreUpdated(PlayerScoreMsg {
            id: c.id.clone(),
            score: 15,
        });
        assert_eq!(c.drain(), vec![expected.clone()]);
        assert_eq!(other.drain(), vec![expected]);
    }

    #[test]
    fn lagging_client_is_dropped_and_announced() {
        let mut session = test_session();
        let (tx, mut slow_rx) = mpsc::channel(4);
        let slow = session.connect(tx).unwrap();
        let mut mover = join(&mut session);
        mover.drain();

        for i in 0..10 {
            session.dispatch(
                &mover.id,
                ClientMsg::UpdatePosition(UpdatePositionMsg {
                    position: [i as f64, 0.0, 0.0],
                    rotation: [0.0, 0.0, 0.0],
                    throttle: None,
                }),
            );
        }

        assert!(!session.registry().contains(&slow));
        assert_eq!(mover.drain(), vec![ServerMsg::PlayerLeft(slow.clone())]);

        let mut seen = Vec::new();
        while let Ok(msg) = slow_rx.try_recv() {
            seen.push(msg.event_name());
        }
        assert_eq!(seen, vec!["welcome", "players", "playerJoined", "playerMoved"]);
        assert_eq!(
            slow_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );

        session.disconnect(&mover.id);
        assert_eq!(session.registry().count(), 0);
    }

    #[tokio::test]
    async fn join_via_actor_returns_id() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        tokio::spawn(run_session(cmd_rx, ArenaConfig::default(), 7));

        let (outbox, mut rx) = mpsc::channel(16);
        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(SessionCommand::Join {
                outbox,
                response: resp_tx,
            })
            .await
            .unwrap();
        let id = resp_rx.await.unwrap();

        match rx.recv().await.unwrap() {
            ServerMsg::Welcome(w) => assert_eq!(w.self_id, id),
            other => panic!("Expected Welcome, got {:?}", other),
        }
    }

    #[test]
    fn abandoned_join_is_rolled_back() {
        let mut session = test_session();
        let mut a = join(&mut session);
        a.drain();

        let (outbox, _rx) = mpsc::channel(16);
        let (resp_tx, resp_rx) = oneshot::channel();
        drop(resp_rx);
        session.handle(SessionCommand::Join {
            outbox,
            response: resp_tx,
        });

        assert_eq!(session.registry().count(), 1);
        assert_eq!(a.events(), vec!["playerJoined", "playerLeft"]);
    }
}
