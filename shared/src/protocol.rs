use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Server-assigned connection identifier. Unique for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

// === Server -> Client ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    Welcome(WelcomeMsg),
    /// Full roster, sent once to a freshly connected client
    Players(Vec<PlayerWire>),
    PlayerJoined(PlayerWire),
    PlayerMoved(PlayerMovedMsg),
    ProjectileFired(ProjectileRelayMsg),
    PlayerEliminated(PlayerEliminatedMsg),
    /// Attacker's own score after an elimination credit
    ScoreUpdated(ScoreUpdatedMsg),
    PlayerHealthUpdated(PlayerHealthMsg),
    Respawn(RespawnMsg),
    PlayerScoreUpdated(PlayerScoreMsg),
    PlayerLeft(PlayerId),
    Error(ErrorMsg),
}

impl ServerMsg {
    /// Wire event name, used for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMsg::Welcome(_) => "welcome",
            ServerMsg::Players(_) => "players",
            ServerMsg::PlayerJoined(_) => "playerJoined",
            ServerMsg::PlayerMoved(_) => "playerMoved",
            ServerMsg::ProjectileFired(_) => "projectileFired",
            ServerMsg::PlayerEliminated(_) => "playerEliminated",
            ServerMsg::ScoreUpdated(_) => "scoreUpdated",
            ServerMsg::PlayerHealthUpdated(_) => "playerHealthUpdated",
            ServerMsg::Respawn(_) => "respawn",
            ServerMsg::PlayerScoreUpdated(_) => "playerScoreUpdated",
            ServerMsg::PlayerLeft(_) => "playerLeft",
            ServerMsg::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub self_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub id: PlayerId,
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    pub throttle: u32,
    pub health: u32,
    pub score: u32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct PlayerMovedMsg {
    pub id: PlayerId,
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    pub throttle: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct ProjectileRelayMsg {
    pub id: PlayerId,
    pub position: [f64; 3],
    pub direction: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerEliminatedMsg {
    pub id: PlayerId,
    pub eliminated_by: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct ScoreUpdatedMsg {
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct PlayerHealthMsg {
    pub id: PlayerId,
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct RespawnMsg {
    pub position: [f64; 3],
    pub health: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct PlayerScoreMsg {
    pub id: PlayerId,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MalformedPayload,
    MessageTooLarge,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct ErrorMsg {
    pub kind: ErrorKind,
    pub message: String,
}

// === Client -> Server ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    UpdatePosition(UpdatePositionMsg),
    ProjectileFired(ProjectileFiredMsg),
    PlayerDamaged(PlayerDamagedMsg),
    AsteroidDestroyed(AsteroidDestroyedMsg),
}

impl ClientMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMsg::UpdatePosition(_) => "updatePosition",
            ClientMsg::ProjectileFired(_) => "projectileFired",
            ClientMsg::PlayerDamaged(_) => "playerDamaged",
            ClientMsg::AsteroidDestroyed(_) => "asteroidDestroyed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct UpdatePositionMsg {
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    /// Older clients omit throttle; treated as 0
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub throttle: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct ProjectileFiredMsg {
    pub position: [f64; 3],
    pub direction: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerDamagedMsg {
    pub amount: u32,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub source_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../client/src/generated/")]
pub struct AsteroidDestroyedMsg {
    pub points: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_uses_event_envelope() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: "0.1.0".to_string(),
            self_id: PlayerId::from("1-abc"),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"event\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"selfId\":\"1-abc\""));
    }

    #[test]
    fn player_left_payload_is_bare_id() {
        let msg = ServerMsg::PlayerLeft(PlayerId::from("7-d00d"));
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"event":"playerLeft","data":"7-d00d"}"#);
    }

    #[test]
    fn players_roster_is_array_of_states() {
        let msg = ServerMsg::Players(vec![PlayerWire {
            id: PlayerId::from("a"),
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            throttle: 0,
            health: 100,
            score: 0,
            color: "#FF6B6B".to_string(),
        }]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "players");
        assert_eq!(value["data"][0]["health"], 100);
        assert_eq!(value["data"][0]["color"], "#FF6B6B");
    }

    #[test]
    fn eliminated_uses_camel_case_attacker_field() {
        let msg = ServerMsg::PlayerEliminated(PlayerEliminatedMsg {
            id: PlayerId::from("victim"),
            eliminated_by: Some(PlayerId::from("attacker")),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "playerEliminated");
        assert_eq!(value["data"]["eliminatedBy"], "attacker");
    }

    #[test]
    fn update_position_without_throttle_parses() {
        let json = r#"{"event":"updatePosition","data":{"position":[1,2,3],"rotation":[0,0.5,0]}}"#;
        match serde_json::from_str::<ClientMsg>(json).unwrap() {
            ClientMsg::UpdatePosition(m) => {
                assert_eq!(m.position, [1.0, 2.0, 3.0]);
                assert_eq!(m.throttle, None);
            }
            other => panic!("Expected UpdatePosition, got {:?}", other),
        }
    }

    #[test]
    fn player_damaged_source_id_is_optional() {
        let with = r#"{"event":"playerDamaged","data":{"amount":25,"sourceId":"b"}}"#;
        let without = r#"{"event":"playerDamaged","data":{"amount":25}}"#;
        match serde_json::from_str::<ClientMsg>(with).unwrap() {
            ClientMsg::PlayerDamaged(m) => assert_eq!(m.source_id, Some(PlayerId::from("b"))),
            _ => panic!("Expected PlayerDamaged"),
        }
        match serde_json::from_str::<ClientMsg>(without).unwrap() {
            ClientMsg::PlayerDamaged(m) => assert_eq!(m.source_id, None),
            _ => panic!("Expected PlayerDamaged"),
        }
    }

    #[test]
    fn negative_points_are_rejected() {
        let json = r#"{"event":"asteroidDestroyed","data":{"points":-5}}"#;
        assert!(serde_json::from_str::<ClientMsg>(json).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let json = r#"{"event":"projectileFired","data":{"position":[0,0,0]}}"#;
        assert!(serde_json::from_str::<ClientMsg>(json).is_err());
    }

    #[test]
    fn unknown_event_is_rejected() {
        let json = r#"{"event":"teleport","data":{}}"#;
        assert!(serde_json::from_str::<ClientMsg>(json).is_err());
    }
}
