use crate::protocol::{PlayerId, PlayerWire};
use rand::seq::SliceRandom;
use rand::Rng;
use skirmish_shared::vec3::Vec3;

/// Display colors handed out to new players. Repeats are allowed.
pub const PALETTE: [&str; 8] = [
    "#FF6B6B", // red
    "#4ECDC4", // teal
    "#FFE66D", // yellow
    "#6BFF9E", // green
    "#6B95FF", // blue
    "#D46BFF", // purple
    "#FF9E6B", // orange
    "#FF6BE6", // pink
];

/// Authoritative state for one connected ship
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub position: Vec3,
    /// Pitch, yaw, roll in radians
    pub rotation: Vec3,
    pub throttle: u32,
    pub health: u32,
    pub score: u32,
    pub color: &'static str,
}

impl PlayerState {
    /// Fresh ship at the origin with full health.
    pub fn spawn(id: PlayerId, max_health: u32, color: &'static str) -> Self {
        Self {
            id,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            throttle: 0,
            health: max_health,
            score: 0,
            color,
        }
    }

    pub fn to_wire(&self) -> PlayerWire {
        PlayerWire {
            id: self.id.clone(),
            position: self.position.to_array(),
            rotation: self.rotation.to_array(),
            throttle: self.throttle,
            health: self.health,
            score: self.score,
            color: self.color.to_string(),
        }
    }
}

/// Pick a palette color at random.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PALETTE.choose(rng).copied().unwrap_or(PALETTE[0])
}
