//! Broadcast router: fans outbound events into per-connection outboxes.
//!
//! Sends never block. A connection whose outbox is full is reported back as
//! lagging so the session can drop it; its client reconnects and gets a fresh
//! roster. One whose outbox is closed is already on its way out and will be
//! detached by its own disconnect.

use crate::protocol::{PlayerId, ServerMsg};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Who an outbound event is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    All,
    AllExcept(PlayerId),
    To(PlayerId),
}

/// One outbound event with its delivery mode, as produced by the mutator
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub delivery: Delivery,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn all(msg: ServerMsg) -> Self {
        Self {
            delivery: Delivery::All,
            msg,
        }
    }

    pub fn all_except(sender: &PlayerId, msg: ServerMsg) -> Self {
        Self {
            delivery: Delivery::AllExcept(sender.clone()),
            msg,
        }
    }

    pub fn to(id: &PlayerId, msg: ServerMsg) -> Self {
        Self {
            delivery: Delivery::To(id.clone()),
            msg,
        }
    }
}

#[derive(Default)]
pub struct BroadcastRouter {
    peers: HashMap<PlayerId, mpsc::Sender<ServerMsg>>,
}

impl BroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, id: PlayerId, outbox: mpsc::Sender<ServerMsg>) {
        self.peers.insert(id, outbox);
    }

    pub fn detach(&mut self, id: &PlayerId) {
        self.peers.remove(id);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Deliver one event. Returns the peers whose outbox overflowed.
    pub fn dispatch(&self, out: Outbound) -> Vec<PlayerId> {
        match out.delivery {
            Delivery::All => self.to_all(&out.msg),
            Delivery::AllExcept(sender) => self.to_all_except(&sender, &out.msg),
            Delivery::To(id) => self.to_one(&id, out.msg),
        }
    }

    /// Every connected client, sender included.
    pub fn to_all(&self, msg: &ServerMsg) -> Vec<PlayerId> {
        self.peers
            .iter()
            .filter(|(id, outbox)| !push(id, outbox, msg.clone()))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn to_all_except(&self, sender: &PlayerId, msg: &ServerMsg) -> Vec<PlayerId> {
        self.peers
            .iter()
            .filter(|(id, _)| *id != sender)
            .filter(|(id, outbox)| !push(id, outbox, msg.clone()))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Addressed send. Unknown ids are ignored.
    pub fn to_one(&self, id: &PlayerId, msg: ServerMsg) -> Vec<PlayerId> {
        match self.peers.get(id) {
            Some(outbox) if !push(id, outbox, msg.clone()) => vec![id.clone()],
            Some(_) => Vec::new(),
            None => {
                tracing::debug!("Dropping {} for departed player {}", msg.event_name(), id);
                Vec::new()
            }
        }
    }
}

/// False only when the outbox is full.
fn push(id: &PlayerId, outbox: &mpsc::Sender<ServerMsg>, msg: ServerMsg) -> bool {
    match outbox.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(msg)) => {
            tracing::warn!("Outbox full for player {} at {}", id, msg.event_name());
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Outbox closed for player {}", id);
            true
        }
    }
}
