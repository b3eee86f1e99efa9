//! Next-night room assignment.
//!
//! Rooms are registered once at scene load with a required occupant count.
//! The fill pass runs once per Night transition and must never leave a room
//! holding only some of its required occupants; a stuck partial room is
//! cleared wholesale and the pass retried.

use crate::players::{PlayerRegistry, RoomAssignment};
use crate::types::{PlayerId, RoomId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bound on clear-and-retry rounds; exceeding it means the room layout
/// cannot be satisfied with the connected players.
const MAX_FILL_RETRIES: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    /// Required occupants for the room's night minigame.
    pub capacity: u32,
}

/// Room catalog plus the auto-fill algorithm. Assignments themselves live on
/// the players as replicated per-player state.
#[derive(Debug, Default)]
pub struct SpawnAssignment {
    rooms: Vec<RoomConfig>,
}

impl SpawnAssignment {
    pub fn new() -> Self {
        Self { rooms: Vec::new() }
    }

    pub fn add_room(&mut self, name: &str, capacity: u32) -> RoomId {
        let id = RoomId(self.rooms.len() as u16);
        self.rooms.push(RoomConfig { id, name: name.to_string(), capacity: capacity.max(1) });
        id
    }

    pub fn rooms(&self) -> &[RoomConfig] {
        &self.rooms
    }

    pub fn capacity(&self, room: RoomId) -> Option<u32> {
        self.rooms.iter().find(|r| r.id == room).map(|r| r.capacity)
    }

    fn occupants(players: &PlayerRegistry, room: RoomId) -> Vec<PlayerId> {
        players
            .iter()
            .filter(|p| p.assignment.get().map(|a| a.room) == Some(room))
            .map(|p| p.id)
            .collect()
    }

    fn unassigned(players: &PlayerRegistry) -> Vec<PlayerId> {
        players.iter().filter(|p| p.assignment.get().is_none()).map(|p| p.id).collect()
    }

    fn is_partial(&self, players: &PlayerRegistry, room: &RoomConfig) -> bool {
        let n = Self::occupants(players, room.id).len() as u32;
        n > 0 && n < room.capacity
    }

    fn assign_into(players: &mut PlayerRegistry, room: RoomId, id: PlayerId, spawn_index: u32) {
        if let Some(player) = players.get_mut(id) {
            player.assignment.set_server(Some(RoomAssignment { room, spawn_index }));
        }
    }

    /// A player currently alone in a single-occupant room, if any.
    fn loner<R: Rng>(&self, players: &PlayerRegistry, rng: &mut R) -> Option<PlayerId> {
        let loners: Vec<PlayerId> = self
            .rooms
            .iter()
            .filter(|r| r.capacity == 1)
            .flat_map(|r| Self::occupants(players, r.id))
            .collect();
        loners.choose(rng).copied()
    }

    fn clear_room(players: &mut PlayerRegistry, room: RoomId) {
        for id in Self::occupants(players, room) {
            if let Some(player) = players.get_mut(id) {
                player.assignment.set_server(None);
            }
        }
    }

    /// Drop every assignment.
    pub fn clear_all(players: &mut PlayerRegistry) {
        for player in players.iter_mut() {
            player.assignment.set_server(None);
        }
    }

    /// Directly place one player (commander or debug path). The spawn index
    /// is the room's current occupant count.
    pub fn set_room(&self, players: &mut PlayerRegistry, id: PlayerId, room: RoomId) {
        let spawn_index = Self::occupants(players, room).len() as u32;
        Self::assign_into(players, room, id, spawn_index);
    }

    /// The once-per-Night auto-fill. Completes partially filled rooms first,
    /// pulling stragglers and then loners from single-occupant rooms; a room
    /// that still cannot be completed is cleared and the pass retried. Once
    /// no partial room remains, empty rooms fill greedily smallest-capacity
    /// first, with one final backfill for multiplayer rooms.
    pub fn fill<R: Rng>(&self, players: &mut PlayerRegistry, rng: &mut R) {
        let mut retries = 0usize;
        loop {
            // (a) one unassigned straggler into each partially filled room
            for room in &self.rooms {
                if self.is_partial(players, room) {
                    let pool = Self::unassigned(players);
                    if let Some(&pick) = pool.choose(rng) {
                        let spawn_index = Self::occupants(players, room.id).len() as u32;
                        Self::assign_into(players, room.id, pick, spawn_index);
                    }
                }
            }
            // (b) pull players sitting alone in single rooms
            for room in &self.rooms {
                if room.capacity > 1 && self.is_partial(players, room) {
                    if let Some(pick) = self.loner(players, rng) {
                        let spawn_index = Self::occupants(players, room.id).len() as u32;
                        Self::assign_into(players, room.id, pick, spawn_index);
                    }
                }
            }
            // (c) clear any room still partial and retry the whole pass
            let stuck: Vec<RoomId> = self
                .rooms
                .iter()
                .filter(|r| self.is_partial(players, r))
                .map(|r| r.id)
                .collect();
            if stuck.is_empty() {
                break;
            }
            for room in &stuck {
                Self::clear_room(players, *room);
            }
            retries += 1;
            if retries > MAX_FILL_RETRIES {
                log::warn!("room fill did not settle after {} retries", MAX_FILL_RETRIES);
                break;
            }
        }

        // (d) fill empty rooms, smallest capacity first
        let mut empty: Vec<RoomConfig> = self
            .rooms
            .iter()
            .filter(|r| Self::occupants(players, r.id).is_empty())
            .cloned()
            .collect();
        empty.sort_by_key(|r| r.capacity);
        for room in empty {
            for spawn_index in 0..room.capacity {
                let pool = Self::unassigned(players);
                let Some(&pick) = pool.choose(rng) else { break };
                Self::assign_into(players, room.id, pick, spawn_index);
            }
        }

        // (e) final backfill for multiplayer rooms, when the lobby is big
        // enough to complete them
        for room in &self.rooms {
            if room.capacity > 1
                && self.is_partial(players, room)
                && players.len() as u32 >= room.capacity
            {
                while self.is_partial(players, room) {
                    let Some(pick) = self.loner(players, rng) else { break };
                    let spawn_index = Self::occupants(players, room.id).len() as u32;
                    Self::assign_into(players, room.id, pick, spawn_index);
                }
            }
        }
    }
}
