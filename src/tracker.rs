//! # Meter State Tracker
//!
//! Decides whether a freshly read message is worth publishing. A snapshot is
//! emitted when any configured value changed, or when nothing changed for
//! longer than the heartbeat interval, so the bus sees the meter at least once
//! per interval even when consumption is zero.
//!
//! A message in which any configured offset does not decode is dropped as a
//! whole. A published snapshot never mixes fresh values with stale ones.

use crate::sml::field::decode_field;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Maps an entity to the offset of its value inside an SML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub id: String,
    pub offset: usize,
}

impl EntityDescriptor {
    pub fn new(id: impl Into<String>, offset: usize) -> Self {
        EntityDescriptor {
            id: id.into(),
            offset,
        }
    }
}

/// Last known value of every tracked entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, i128>);

impl Snapshot {
    pub fn get(&self, entity: &str) -> Option<i128> {
        self.0.get(entity).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i128)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, i128> {
        self.0
    }
}

impl FromIterator<(String, i128)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, i128)>>(iter: I) -> Self {
        Snapshot(iter.into_iter().collect())
    }
}

pub struct MeterStateTracker {
    entities: Vec<EntityDescriptor>,
    last_values: Snapshot,
    last_emit: Instant,
    max_interval: Duration,
    incomplete: u64,
}

impl MeterStateTracker {
    /// Tracks `entities`, starting every value at zero. The heartbeat clock
    /// starts now.
    pub fn new(entities: Vec<EntityDescriptor>, max_interval: Duration) -> Self {
        Self::starting_at(entities, max_interval, Instant::now())
    }

    /// Like `new`, with the heartbeat clock starting at `start`.
    ///
    /// Entities are kept in the given order. If an id repeats, the first
    /// descriptor wins.
    pub fn starting_at(
        entities: Vec<EntityDescriptor>,
        max_interval: Duration,
        start: Instant,
    ) -> Self {
        let mut last_values = BTreeMap::new();
        let mut unique = Vec::with_capacity(entities.len());
        for entity in entities {
            if last_values.insert(entity.id.clone(), 0).is_none() {
                unique.push(entity);
            }
        }

        MeterStateTracker {
            entities: unique,
            last_values: Snapshot(last_values),
            last_emit: start,
            max_interval,
            incomplete: 0,
        }
    }

    pub fn entities(&self) -> &[EntityDescriptor] {
        &self.entities
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Number of messages dropped because a configured offset did not decode
    pub fn incomplete_messages(&self) -> u64 {
        self.incomplete
    }

    /// Current values, including ones not published yet.
    pub fn last_values(&self) -> &Snapshot {
        &self.last_values
    }

    pub fn update(&mut self, buffer: &[u8]) -> Option<Snapshot> {
        self.update_at(buffer, Instant::now())
    }

    /// Decodes every entity from `buffer` and returns a snapshot when a value
    /// changed or the heartbeat interval elapsed at `now`.
    pub fn update_at(&mut self, buffer: &[u8], now: Instant) -> Option<Snapshot> {
        let mut fresh = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            match decode_field(buffer, entity.offset) {
                Some(value) => fresh.push(value),
                None => {
                    debug!(
                        "No integer for '{}' at offset {}, dropping message",
                        entity.id, entity.offset
                    );
                    self.incomplete += 1;
                    return None;
                }
            }
        }

        let mut changed = false;
        for (entity, value) in self.entities.iter().zip(fresh) {
            if let Some(last) = self.last_values.0.get_mut(&entity.id) {
                if *last != value {
                    changed = true;
                    *last = value;
                }
            }
        }

        let heartbeat_due = now.saturating_duration_since(self.last_emit) > self.max_interval;
        if !changed && !heartbeat_due {
            return None;
        }

        debug!(
            "Emitting snapshot ({})",
            if changed { "changed" } else { "heartbeat" }
        );
        self.last_emit = now;
        Some(self.last_values.clone())
    }
}
