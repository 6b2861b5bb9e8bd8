//! State mutator: applies one inbound event to the registry and returns the
//! outbound events it causes, each tagged with its delivery mode.
//!
//! Events from a sender that is no longer registered produce nothing; this is
//! the normal race between a disconnect and frames still in flight.

use crate::player::PlayerState;
use crate::protocol::{
    ClientMsg, PlayerDamagedMsg, PlayerEliminatedMsg, PlayerHealthMsg, PlayerId, PlayerMovedMsg,
    PlayerScoreMsg, ProjectileFiredMsg, ProjectileRelayMsg, RespawnMsg, ScoreUpdatedMsg, ServerMsg,
    UpdatePositionMsg,
};
use crate::registry::Registry;
use crate::router::Outbound;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use skirmish_shared::config::ArenaConfig;
use skirmish_shared::vec3::Vec3;

pub struct StateMutator {
    arena: ArenaConfig,
    /// Respawn placement
    rng: ChaCha8Rng,
}

impl StateMutator {
    pub fn new(arena: ArenaConfig, rng: ChaCha8Rng) -> Self {
        Self { arena, rng }
    }

    pub fn apply(
        &mut self,
        registry: &mut Registry,
        sender: &PlayerId,
        msg: ClientMsg,
    ) -> Vec<Outbound> {
        match msg {
            ClientMsg::UpdatePosition(m) => self.apply_position_update(registry, sender, m),
            ClientMsg::ProjectileFired(m) => self.relay_projectile(registry, sender, m),
            ClientMsg::PlayerDamaged(m) => self.apply_damage(registry, sender, m),
            ClientMsg::AsteroidDestroyed(m) => {
                self.apply_asteroid_destroyed(registry, sender, m.points)
            }
        }
    }

    pub fn apply_position_update(
        &mut self,
        registry: &mut Registry,
        sender: &PlayerId,
        update: UpdatePositionMsg,
    ) -> Vec<Outbound> {
        let Some(player) = registry.get_mut(sender) else {
            return unknown_sender(sender, "updatePosition");
        };
        player.position = Vec3::from(update.position);
        player.rotation = Vec3::from(update.rotation);
        player.throttle = update
            .throttle
            .unwrap_or(0)
            .clamp(0, self.arena.max_throttle as i32) as u32;
        tracing::trace!(
            "Player {} moved to {:?} with throttle {}",
            sender,
            update.position,
            player.throttle
        );

        vec![Outbound::all_except(
            sender,
            ServerMsg::PlayerMoved(PlayerMovedMsg {
                id: sender.clone(),
                position: player.position.to_array(),
                rotation: player.rotation.to_array(),
                throttle: player.throttle,
            }),
        )]
    }

    /// Relay a shot to everyone else. No state changes.
    pub fn relay_projectile(
        &mut self,
        registry: &Registry,
        sender: &PlayerId,
        shot: ProjectileFiredMsg,
    ) -> Vec<Outbound> {
        if !registry.contains(sender) {
            return unknown_sender(sender, "projectileFired");
        }
        vec![Outbound::all_except(
            sender,
            ServerMsg::ProjectileFired(ProjectileRelayMsg {
                id: sender.clone(),
                position: shot.position,
                direction: shot.direction,
            }),
        )]
    }

    /// Damage reported by the victim's own client.
    ///
    /// When health reaches zero the victim is eliminated, the named attacker
    /// (if still connected) is credited, and the victim respawns at full
    /// health somewhere in the arena, all within this one step. Health is
    /// therefore never observed at zero between events.
    pub fn apply_damage(
        &mut self,
        registry: &mut Registry,
        sender: &PlayerId,
        damage: PlayerDamagedMsg,
    ) -> Vec<Outbound> {
        let Some(victim) = registry.get_mut(sender) else {
            return unknown_sender(sender, "playerDamaged");
        };
        victim.health = victim.health.saturating_sub(damage.amount);

        let mut out = Vec::new();
        if victim.health == 0 {
            let respawn_at = self.respawn_position();
            respawn(victim, respawn_at, self.arena.max_health);
            tracing::info!(
                "Player {} eliminated by {}",
                sender,
                damage
                    .source_id
                    .as_ref()
                    .map_or("unknown", PlayerId::as_str)
            );

            out.push(Outbound::all(ServerMsg::PlayerEliminated(
                PlayerEliminatedMsg {
                    id: sender.clone(),
                    eliminated_by: damage.source_id.clone(),
                },
            )));

            if let Some(attacker_id) = &damage.source_id {
                match registry.get_mut(attacker_id) {
                    Some(attacker) => {
                        attacker.score = attacker
                            .score
                            .saturating_add(self.arena.elimination_reward);
                        out.push(Outbound::to(
                            attacker_id,
                            ServerMsg::ScoreUpdated(ScoreUpdatedMsg {
                                score: attacker.score,
                            }),
                        ));
                    }
                    None => tracing::debug!("Attacker {} no longer connected", attacker_id),
                }
            }

            out.push(Outbound::to(
                sender,
                ServerMsg::Respawn(RespawnMsg {
                    position: respawn_at.to_array(),
                    health: self.arena.max_health,
                }),
            ));
        }

        let health = registry.get(sender).map_or(0, |p| p.health);
        out.push(Outbound::all(ServerMsg::PlayerHealthUpdated(
            PlayerHealthMsg {
                id: sender.clone(),
                health,
            },
        )));
        out
    }

    pub fn apply_asteroid_destroyed(
        &mut self,
        registry: &mut Registry,
        sender: &PlayerId,
        points: u32,
    ) -> Vec<Outbound> {
        let Some(player) = registry.get_mut(sender) else {
            return unknown_sender(sender, "asteroidDestroyed");
        };
        player.score = player.score.saturating_add(points);
        vec![Outbound::all(ServerMsg::PlayerScoreUpdated(PlayerScoreMsg {
            id: sender.clone(),
            score: player.score,
        }))]
    }

    /// Uniform point in the respawn cube around the origin
    fn respawn_position(&mut self) -> Vec3 {
        let h = self.arena.respawn_half_extent;
        let at = Vec3::new(
            self.rng.gen_range(-h..h),
            self.rng.gen_range(-h..h),
            self.rng.gen_range(-h..h),
        );
        debug_assert!(at.within_cube(h));
        at
    }
}

fn respawn(player: &mut PlayerState, at: Vec3, max_health: u32) {
    player.health = max_health;
    player.position = at;
}

fn unknown_sender(sender: &PlayerId, event: &str) -> Vec<Outbound> {
    tracing::debug!("Ignoring {} from unregistered player {}", event, sender);
    Vec::new()
}
