use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::{Command, Event, ReplayFile, Snapshot};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

// MessagePack payloads are written with field names: internally tagged enums and
// `#[serde(default)]` fields need the map encoding to decode.

pub fn serialize_command(cmd: &Command) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(cmd)?)
}

pub fn deserialize_command(bytes: &[u8]) -> Result<Command, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_events(events: &[Event]) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(events)?)
}

pub fn deserialize_events(bytes: &[u8]) -> Result<Vec<Event>, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(snapshot)?)
}

pub fn deserialize_snapshot(bytes: &[u8]) -> Result<Snapshot, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_replay(replay: &ReplayFile) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(replay)?)
}

pub fn deserialize_replay(bytes: &[u8]) -> Result<ReplayFile, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_snapshot_json(snapshot: &Snapshot) -> Result<String, WireError> {
    Ok(serde_json::to_string(snapshot)?)
}

pub fn deserialize_snapshot_json(json: &str) -> Result<Snapshot, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_replay_json(replay: &ReplayFile) -> Result<String, WireError> {
    Ok(serde_json::to_string(replay)?)
}

pub fn deserialize_replay_json(json: &str) -> Result<ReplayFile, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_events_json(events: &[Event]) -> Result<String, WireError> {
    Ok(serde_json::to_string(events)?)
}

/// Deterministic snapshot hash for desync detection and replay verification.
///
/// Hashes the MessagePack-serialized snapshot using FNV-1a 64-bit.
pub fn snapshot_hash(snapshot: &Snapshot) -> Result<u64, WireError> {
    let bytes = serialize_snapshot(snapshot)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coord, EntityId, PlayerId, Relation, RelationSnapshot};

    #[test]
    fn command_survives_msgpack() {
        let cmd = Command::MoveUnit {
            unit: EntityId::new(4, 1),
            to: Coord::new(2, 7),
        };
        let bytes = serialize_command(&cmd).unwrap();
        assert_eq!(deserialize_command(&bytes).unwrap(), cmd);
    }

    #[test]
    fn events_survive_msgpack() {
        let events = vec![
            Event::TurnEnded {
                turn: 3,
                player: PlayerId(1),
            },
            Event::RelationChanged {
                from: PlayerId(0),
                to: PlayerId(1),
                relation: Relation::Hostile,
            },
        ];
        let bytes = serialize_events(&events).unwrap();
        assert_eq!(deserialize_events(&bytes).unwrap(), events);
    }

    #[test]
    fn snapshot_json_accepts_missing_diplomacy() {
        let json = r#"{
            "map_size": 2, "turn": 1, "max_turns": 30, "current_player": 0, "num_players": 2,
            "players": [], "tiles": [], "units": [], "cities": [],
            "rng_state": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0]
        }"#;
        let snapshot = deserialize_snapshot_json(json).unwrap();
        assert!(snapshot.diplomacy.is_empty());
        assert!(snapshot.explored.is_empty());
        assert!(snapshot.outcome.is_none());

        let rel = RelationSnapshot {
            from: PlayerId(0),
            to: PlayerId(1),
            relation: Relation::Friendly,
            has_embassy: true,
            peace_offered: false,
        };
        let mut with_rel = snapshot.clone();
        with_rel.diplomacy.push(rel);
        assert_ne!(
            snapshot_hash(&snapshot).unwrap(),
            snapshot_hash(&with_rel).unwrap()
        );
    }

    #[test]
    fn fnv_is_stable() {
        assert_eq!(hash_bytes_fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(hash_bytes_fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
    }
}
