//! Keyed side-effect cooldowns
//!
//! The same pattern recurs across the engine (warning audio, red-light
//! penalties, plate reads): suppress a repeat side effect for a key within
//! a time window. Implemented once here instead of ad hoc maps per feature.

use std::collections::HashMap;
use std::hash::Hash;

/// Per-key suppression window over pipeline time (seconds)
#[derive(Debug)]
pub struct KeyedCooldown<K> {
    window_secs: f64,
    last_fired: HashMap<K, f64>,
}

impl<K: Eq + Hash + Clone> KeyedCooldown<K> {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs,
            last_fired: HashMap::new(),
        }
    }

    /// Try to fire the side effect for `key` at time `now`.
    ///
    /// Returns true (and records the firing) when the key is outside its
    /// window; false when the effect should be suppressed.
    pub fn try_fire(&mut self, key: K, now: f64) -> bool {
        match self.last_fired.get(&key) {
            Some(&last) if now - last < self.window_secs => false,
            _ => {
                self.last_fired.insert(key, now);
                true
            }
        }
    }

    /// Drop a key's state so its next attempt fires immediately
    pub fn reset(&mut self, key: &K) {
        self.last_fired.remove(key);
    }

    /// Discard entries idle longer than `max_age_secs` (bounds memory for
    /// long-running loops with churning track ids)
    pub fn purge_idle(&mut self, now: f64, max_age_secs: f64) {
        self.last_fired.retain(|_, &mut last| now - last < max_age_secs);
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}
