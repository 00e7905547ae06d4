// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Degraded-mode simulator.
//!
//! Runs only while the session is `Degraded`. It seeds the level tag and the
//! toggle tags at start, then moves the level tag every `level_interval` and
//! flips one random toggle tag every `toggle_interval`. Values go through the
//! store and the distribution channel exactly like real notifications; the
//! store's connected flag is never touched.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use station_core::channel::DistributionChannel;
use station_core::registry::{TagDefinition, TagRegistry};
use station_core::store::TagValueStore;
use station_core::types::{TagValue, ValueType};

use crate::types::SimulatorSettings;

/// Handle of a running simulator task.
#[derive(Debug)]
pub struct SimulatorHandle {
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    /// Stops the simulator and waits for its task to exit.
    pub async fn stop(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }

    /// Returns `true` while the task runs.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Source of simulated values.
pub struct Simulator {
    settings: SimulatorSettings,
    level: Option<TagDefinition>,
    toggles: Vec<TagDefinition>,
    store: Arc<TagValueStore>,
    channel: Arc<DistributionChannel>,
    rng: StdRng,
}

impl Simulator {
    /// Creates a simulator for the given registry.
    ///
    /// A missing or non-numeric level tag disables level updates. An empty
    /// toggle list falls back to every readable boolean tag.
    pub fn new(
        settings: SimulatorSettings,
        registry: &TagRegistry,
        store: Arc<TagValueStore>,
        channel: Arc<DistributionChannel>,
    ) -> Self {
        let level = registry
            .lookup(&settings.level_tag)
            .ok()
            .filter(|t| t.is_readable() && t.value_type.is_numeric())
            .cloned();
        if level.is_none() {
            tracing::warn!(tag = %settings.level_tag, "Simulator level tag unusable, level updates disabled");
        }

        let toggles: Vec<TagDefinition> = if settings.toggle_tags.is_empty() {
            registry
                .boolean_tags()
                .filter(|t| t.is_readable())
                .cloned()
                .collect()
        } else {
            settings
                .toggle_tags
                .iter()
                .filter_map(|name| registry.lookup(name).ok())
                .filter(|t| t.is_readable() && t.value_type == ValueType::Boolean)
                .cloned()
                .collect()
        };

        Self {
            settings,
            level,
            toggles,
            store,
            channel,
            rng: StdRng::from_entropy(),
        }
    }

    /// Uses a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Seeds initial values and spawns the periodic task.
    pub fn spawn(mut self) -> SimulatorHandle {
        self.seed();

        let task = tokio::spawn(async move {
            let now = Instant::now();
            let mut level_tick = interval_at(
                now + self.settings.level_interval,
                self.settings.level_interval,
            );
            let mut toggle_tick = interval_at(
                now + self.settings.toggle_interval,
                self.settings.toggle_interval,
            );
            level_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            toggle_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = level_tick.tick() => self.step_level(),
                    _ = toggle_tick.tick() => self.step_toggle(),
                }
            }
        });

        tracing::info!("Simulator started");
        SimulatorHandle { task }
    }

    fn seed(&mut self) {
        if let Some(level) = self.level.clone() {
            let value = self.next_level(&level, None);
            self.apply(&level.name, value);
        }
        for tag in self.toggles.clone() {
            let value = TagValue::Boolean(self.rng.gen_bool(0.5));
            self.apply(&tag.name, value);
        }
    }

    /// Moves the level tag to a new value.
    pub fn step_level(&mut self) {
        let Some(level) = self.level.clone() else {
            return;
        };
        let current = self.store.get(&level.name).ok().flatten();
        let value = self.next_level(&level, current.as_ref());
        self.apply(&level.name, value);
    }

    /// Flips one random toggle tag.
    pub fn step_toggle(&mut self) {
        if self.toggles.is_empty() {
            return;
        }
        let index = self.rng.gen_range(0..self.toggles.len());
        let name = self.toggles[index].name.clone();
        let current = self
            .store
            .get(&name)
            .ok()
            .flatten()
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        self.apply(&name, TagValue::Boolean(!current));
    }

    fn next_level(&mut self, tag: &TagDefinition, current: Option<&TagValue>) -> TagValue {
        let range = tag.effective_range();
        match tag.value_type {
            ValueType::Int16 => {
                let lo = range.min.ceil().max(f64::from(i16::MIN)) as i16;
                let hi = range.max.floor().min(f64::from(i16::MAX)) as i16;
                if hi <= lo {
                    return TagValue::Int16(lo);
                }
                match current.and_then(|v| match v {
                    TagValue::Int16(c) if (lo..=hi).contains(c) => Some(*c),
                    _ => None,
                }) {
                    // Draw from the range minus the current value.
                    Some(c) => {
                        let drawn = self.rng.gen_range(lo..hi);
                        TagValue::Int16(if drawn >= c { drawn + 1 } else { drawn })
                    }
                    None => TagValue::Int16(self.rng.gen_range(lo..=hi)),
                }
            }
            _ => {
                let current = current.and_then(TagValue::as_f64);
                loop {
                    let drawn = self.rng.gen_range(range.min..=range.max) as f32;
                    if current != Some(f64::from(drawn)) {
                        return TagValue::Float(drawn);
                    }
                }
            }
        }
    }

    fn apply(&self, name: &str, value: TagValue) {
        match self.store.set(name, value.clone()) {
            Ok(true) => {
                tracing::trace!(tag = %name, %value, "Simulated value");
                self.channel.publish(name, &value);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(tag = %name, error = %e, "Simulated value rejected"),
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("level", &self.level.as_ref().map(|t| &t.name))
            .field("toggles", &self.toggles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_core::types::AccessRights;
    use std::time::Duration;

    fn fixture() -> (Arc<TagRegistry>, Arc<TagValueStore>, Arc<DistributionChannel>) {
        let registry = Arc::new(
            TagRegistry::new([
                TagDefinition::new("ARU", "ns=1;s=ARU", ValueType::Boolean, AccessRights::READ_WRITE),
                TagDefinition::new("pompe", "ns=1;s=pompe", ValueType::Boolean, AccessRights::READ),
                TagDefinition::new("niveau", "ns=1;s=niveau", ValueType::Int16, AccessRights::READ)
                    .with_range(0.0, 3.0),
            ])
            .unwrap(),
        );
        let store = Arc::new(TagValueStore::new(registry.clone()));
        let channel = Arc::new(DistributionChannel::new(store.clone()));
        (registry, store, channel)
    }

    #[test]
    fn test_level_always_changes() {
        let (registry, store, channel) = fixture();
        let mut simulator = Simulator::new(SimulatorSettings::default(), &registry, store.clone(), channel)
            .with_seed(7);

        simulator.seed();
        for _ in 0..50 {
            let before = store.get("niveau").unwrap();
            simulator.step_level();
            let after = store.get("niveau").unwrap();
            assert_ne!(before, after);
            let v = after.unwrap().as_f64().unwrap();
            assert!((0.0..=3.0).contains(&v));
        }
    }

    #[test]
    fn test_toggle_flips_one_tag() {
        let (registry, store, channel) = fixture();
        let settings = SimulatorSettings {
            toggle_tags: vec!["pompe".into()],
            ..Default::default()
        };
        let mut simulator = Simulator::new(settings, &registry, store.clone(), channel).with_seed(1);

        simulator.seed();
        let before = store.get("pompe").unwrap().unwrap();
        simulator.step_toggle();
        let after = store.get("pompe").unwrap().unwrap();
        assert_ne!(before, after);
        // not a toggle candidate
        assert_eq!(store.get("ARU").unwrap(), None);
    }

    #[test]
    fn test_empty_toggle_list_uses_boolean_tags() {
        let (registry, store, channel) = fixture();
        let simulator = Simulator::new(SimulatorSettings::default(), &registry, store, channel);
        assert_eq!(simulator.toggles.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_level_updates() {
        let (registry, store, channel) = fixture();
        let (_guard, mut events) = channel.attach_channel(64);

        let handle = Simulator::new(SimulatorSettings::default(), &registry, store.clone(), channel.clone())
            .with_seed(3)
            .spawn();
        let seeded = store.get("niveau").unwrap();

        tokio::time::sleep(Duration::from_millis(5100)).await;

        assert_ne!(store.get("niveau").unwrap(), seeded);
        assert!(!store.is_connected());

        let mut level_events = 0;
        while let Ok(event) = events.try_recv() {
            if let station_core::TagEvent::Change { tag, .. } = event {
                if tag == "niveau" {
                    level_events += 1;
                }
            }
        }
        assert_eq!(level_events, 2);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_task() {
        let (registry, store, channel) = fixture();
        let handle = Simulator::new(SimulatorSettings::default(), &registry, store.clone(), channel)
            .with_seed(5)
            .spawn();
        let before = store.get_all();

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(store.get_all(), before);
    }
}
