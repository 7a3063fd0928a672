//! Shared vocabulary between the tribes engine and its clients: coordinates, ids,
//! commands, events, snapshots and their wire encodings.

mod command;
mod coord;
mod event;
mod ids;
mod replay;
mod snapshot;
mod types;
mod victory;
pub mod wire;

pub use crate::command::*;
pub use crate::coord::*;
pub use crate::event::*;
pub use crate::ids::*;
pub use crate::replay::*;
pub use crate::snapshot::*;
pub use crate::types::*;
pub use crate::victory::*;
pub use crate::wire::{
    deserialize_command, deserialize_events, deserialize_replay, deserialize_replay_json,
    deserialize_snapshot, deserialize_snapshot_json, hash_bytes_fnv1a64, serialize_command,
    serialize_events, serialize_events_json, serialize_replay, serialize_replay_json,
    serialize_snapshot, serialize_snapshot_json, snapshot_hash, WireError,
};
