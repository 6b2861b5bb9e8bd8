/// Arena rules shared by the relay and the client
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct ArenaConfig {
    /// Health a player spawns and respawns with
    pub max_health: u32,
    /// Score credited to the attacker on an elimination
    pub elimination_reward: u32,
    /// Respawn positions are drawn from a cube of this half-width around the origin
    pub respawn_half_extent: f64,
    pub max_throttle: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_health: 100,
            elimination_reward: 10,
            respawn_half_extent: 100.0,
            max_throttle: 100,
        }
    }
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_health == 0 {
            return Err("max_health must be > 0".to_string());
        }
        if !self.respawn_half_extent.is_finite() || self.respawn_half_extent <= 0.0 {
            return Err("respawn_half_extent must be finite and > 0".to_string());
        }
        if self.max_throttle > i32::MAX as u32 {
            return Err("max_throttle must fit in i32".to_string());
        }
        Ok(())
    }
}
