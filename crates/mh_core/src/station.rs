//! Minigame stations: replicated health economy and the symmetric link graph.
//!
//! Stations are registered once at scene load and addressed by stable ids.
//! Health mutation is only legal during Night and is bounded per round: a
//! station can never climb above its round-start snapshot and never fall
//! below `round_start − (cap + occupancy bonus)` within one round.

use crate::config::MatchConfig;
use crate::error::{CoreError, Result};
use crate::phase::Phase;
use crate::replication::Replicated;
use crate::types::{PlayerId, RoomId, StationId};
use std::collections::HashSet;

#[derive(Debug)]
pub struct Station {
    pub id: StationId,
    pub room: RoomId,
    /// Whether the spawn auto-fill may send players here.
    pub can_assign: bool,
    pub health: Replicated<i32>,
    pub health_at_round_start: i32,
    decreased_this_round: i32,
    occupants: HashSet<PlayerId>,
    links: Vec<StationId>,
}

impl Station {
    pub fn is_dead(&self) -> bool {
        self.health.value() <= 0
    }

    pub fn is_occupied(&self) -> bool {
        !self.occupants.is_empty()
    }

    pub fn links(&self) -> &[StationId] {
        &self.links
    }

    fn decrease_cap(&self, config: &MatchConfig) -> i32 {
        let bonus = if self.is_occupied() { config.occupancy_bonus } else { 0 };
        config.max_decrease_per_round + bonus
    }

    fn floor(&self, config: &MatchConfig) -> i32 {
        (self.health_at_round_start - self.decrease_cap(config))
            .clamp(0, self.health_at_round_start)
    }
}

/// Arena of stations; the id is the arena index.
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self { stations: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn add(&mut self, room: RoomId, can_assign: bool, config: &MatchConfig) -> StationId {
        let id = StationId(self.stations.len() as u32);
        self.stations.push(Station {
            id,
            room,
            can_assign,
            health: Replicated::server_owned(config.station_max_health),
            health_at_round_start: config.station_max_health,
            decreased_this_round: 0,
            occupants: HashSet::new(),
            links: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.stations.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.stations.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    /// Link two stations. The reverse edge is added automatically so the
    /// relation stays symmetric; duplicate and self links are dropped.
    pub fn link(&mut self, a: StationId, b: StationId) -> Result<()> {
        if a == b {
            log::warn!("self-link request for {:?} dropped", a);
            return Ok(());
        }
        if self.get(a).is_none() {
            return Err(CoreError::UnknownStation(a));
        }
        if self.get(b).is_none() {
            return Err(CoreError::UnknownStation(b));
        }
        let fwd = self.stations.get_mut(a.0 as usize).expect("checked above");
        if !fwd.links.contains(&b) {
            fwd.links.push(b);
        }
        let rev = self.stations.get_mut(b.0 as usize).expect("checked above");
        if !rev.links.contains(&a) {
            rev.links.push(a);
        }
        Ok(())
    }

    pub fn enter(&mut self, id: StationId, player: PlayerId) -> Result<()> {
        let station = self.get_mut(id).ok_or(CoreError::UnknownStation(id))?;
        station.occupants.insert(player);
        Ok(())
    }

    pub fn leave(&mut self, id: StationId, player: PlayerId) -> Result<()> {
        let station = self.get_mut(id).ok_or(CoreError::UnknownStation(id))?;
        station.occupants.remove(&player);
        Ok(())
    }

    /// Drop a disconnecting player from every occupancy set.
    pub fn evict(&mut self, player: PlayerId) {
        for station in &mut self.stations {
            station.occupants.remove(&player);
        }
    }

    /// Snapshot current health as the round baseline. Runs at Night start.
    pub fn snapshot_round_start(&mut self) {
        for station in &mut self.stations {
            station.health_at_round_start = station.health.value();
            station.decreased_this_round = 0;
        }
    }

    /// Clear per-round accounting. Runs at Discussion start; dead stations
    /// stay dead.
    pub fn reset_round(&mut self) {
        for station in &mut self.stations {
            station.decreased_this_round = 0;
        }
    }

    /// Distinct rooms that currently hold a dead station.
    pub fn dead_rooms(&self) -> HashSet<RoomId> {
        self.stations.iter().filter(|s| s.is_dead()).map(|s| s.room).collect()
    }

    /// Dead stations leave the assignment pool for good.
    pub fn retire_dead(&mut self) {
        for station in &mut self.stations {
            if station.is_dead() {
                station.can_assign = false;
            }
        }
    }

    /// Heal a station. Legal only during Night and only while health sits
    /// strictly between 0 and the round-start snapshot. `amount` of 0 means
    /// the configured per-action change. Returns the new health if it moved.
    pub fn increase_health(
        &mut self,
        id: StationId,
        amount: i32,
        phase: Phase,
        config: &MatchConfig,
    ) -> Result<Option<i32>> {
        let amount = if amount == 0 { config.health_action_amount } else { amount };
        let station = self.get_mut(id).ok_or(CoreError::UnknownStation(id))?;
        if phase != Phase::Night {
            log::warn!("increase for {:?} outside Night dropped", id);
            return Ok(None);
        }
        let health = station.health.value();
        if health <= 0 || health >= station.health_at_round_start {
            return Ok(None);
        }
        let healed = (health + amount).clamp(0, station.health_at_round_start);
        if station.health.set_server(healed) {
            Ok(Some(healed))
        } else {
            Ok(None)
        }
    }

    /// Damage a station. Legal only during Night while health is positive.
    /// Once the cumulative decrease this round reaches the cap, health pins
    /// at the floor and no change is reported. `amount` of 0 means the
    /// configured per-action change. Returns the new health if it moved and
    /// a notification should fire.
    pub fn decrease_health(
        &mut self,
        id: StationId,
        amount: i32,
        phase: Phase,
        config: &MatchConfig,
    ) -> Result<Option<i32>> {
        let amount = if amount == 0 { config.health_action_amount } else { amount };
        let station = self.get_mut(id).ok_or(CoreError::UnknownStation(id))?;
        if phase != Phase::Night {
            log::warn!("decrease for {:?} outside Night dropped", id);
            return Ok(None);
        }
        let health = station.health.value();
        if health <= 0 {
            return Ok(None);
        }
        let cap = station.decrease_cap(config);
        let floor = station.floor(config);
        if station.decreased_this_round >= cap {
            // Budget exhausted: pin silently, no notification.
            station.health.set_server(floor);
            return Ok(None);
        }
        let damaged = (health - amount).clamp(floor, station.health_at_round_start);
        station.decreased_this_round += health - damaged;
        if station.health.set_server(damaged) {
            Ok(Some(damaged))
        } else {
            Ok(None)
        }
    }
}
