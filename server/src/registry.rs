//! Connection registry: the in-memory map from connection id to player state.
//!
//! Owned by the session actor; never shared across tasks.

use crate::error::RegistryError;
use crate::player::{random_color, PlayerState};
use crate::protocol::{PlayerId, PlayerWire};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

pub struct Registry {
    players: HashMap<PlayerId, PlayerState>,
    /// Registration order, for stable roster snapshots
    order: Vec<PlayerId>,
    max_health: u32,
    rng: ChaCha8Rng,
}

impl Registry {
    pub fn new(max_health: u32, rng: ChaCha8Rng) -> Self {
        Self {
            players: HashMap::new(),
            order: Vec::new(),
            max_health,
            rng,
        }
    }

    /// Create and store a fresh state for `id` with a random palette color.
    pub fn register(&mut self, id: PlayerId) -> Result<PlayerState, RegistryError> {
        if self.players.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        let color = random_color(&mut self.rng);
        let player = PlayerState::spawn(id.clone(), self.max_health, color);
        self.players.insert(id.clone(), player.clone());
        self.order.push(id);
        Ok(player)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    /// Remove `id`. Removing an absent id is a no-op and returns None.
    pub fn remove(&mut self, id: &PlayerId) -> Option<PlayerState> {
        let removed = self.players.remove(id)?;
        self.order.retain(|o| o != id);
        Some(removed)
    }

    /// All players in registration order
    pub fn all(&self) -> impl Iterator<Item = &PlayerState> {
        self.order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn count(&self) -> usize {
        self.players.len()
    }

    /// Roster for the `players` event
    pub fn snapshot(&self) -> Vec<PlayerWire> {
        self.all().map(PlayerState::to_wire).collect()
    }
}
