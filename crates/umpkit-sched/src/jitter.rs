//! Jitter-reduction synchronizer.
//!
//! Projects JR Clock / JR Timestamp utility messages into the host time base,
//! one base per group.

use std::collections::HashMap;

use tracing::trace;
use umpkit_core::{Midi2Event, Midi2Message, UtilityMessage};

use crate::config::JitterConfig;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
struct GroupState {
    base_ms: f64,
    clock_value: u16,
    last_timestamp: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct JitterReductionSynchronizer {
    config: JitterConfig,
    groups: HashMap<u8, GroupState>,
}

impl JitterReductionSynchronizer {
    pub fn new(config: JitterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            groups: HashMap::new(),
        })
    }

    #[inline]
    pub fn unit_ms(&self) -> f64 {
        self.config.unit_ms
    }

    /// JR Clock `value` seen at host time `received_at_ms`: re-base the group.
    pub fn on_jr_clock(&mut self, group: u8, value: u16, received_at_ms: f64) {
        let base_ms = received_at_ms - f64::from(value) * self.config.unit_ms;
        trace!("group {} JR base {} ms (clock {})", group, base_ms, value);
        self.groups.insert(
            group,
            GroupState {
                base_ms,
                clock_value: value,
                last_timestamp: None,
            },
        );
    }

    /// JR Timestamp `value`: remember it and return its host time, if the group has a base.
    pub fn on_jr_timestamp(&mut self, group: u8, value: u16) -> Option<f64> {
        let state = self.groups.get_mut(&group)?;
        state.last_timestamp = Some(value);
        Some(state.base_ms + f64::from(value) * self.config.unit_ms)
    }

    /// Feed a utility message. Returns the host time for a JR Timestamp with a known base.
    pub fn handle(&mut self, message: &Midi2Message, received_at_ms: f64) -> Option<f64> {
        match message {
            Midi2Message::Utility {
                group,
                message: UtilityMessage::JrClock(value),
            } => {
                self.on_jr_clock(*group, *value, received_at_ms);
                None
            }
            Midi2Message::Utility {
                group,
                message: UtilityMessage::JrTimestamp(value),
            } => self.on_jr_timestamp(*group, *value),
            _ => None,
        }
    }

    /// Host time of `value` (or the group's last JR Timestamp) in the group's base.
    ///
    /// `None` without a JR Clock for the group, or without any timestamp to project.
    pub fn to_absolute_time(&self, group: u8, value: Option<u16>) -> Option<f64> {
        let state = self.groups.get(&group)?;
        let value = value.or(state.last_timestamp)?;
        Some(state.base_ms + f64::from(value) * self.config.unit_ms)
    }

    /// Last JR Clock value seen for `group`.
    pub fn clock_value(&self, group: u8) -> Option<u16> {
        self.groups.get(&group).map(|s| s.clock_value)
    }

    pub fn forget_group(&mut self, group: u8) {
        self.groups.remove(&group);
    }

    pub fn reset(&mut self) {
        self.groups.clear();
    }
}

/// Stamp a received batch through `sync`.
///
/// JR messages update the synchronizer (a JR Timestamp is stamped with its
/// projected time). Other events keep an existing timestamp, else take the
/// projection of their group's last JR Timestamp, else stay unstamped.
pub fn apply_jitter_reduction(
    events: &[Midi2Event],
    sync: &mut JitterReductionSynchronizer,
    received_at_ms: f64,
) -> Vec<Midi2Event> {
    events
        .iter()
        .map(|event| {
            let mut event = event.clone();
            if event.message.is_jitter_reduction() {
                if let Some(ts) = sync.handle(&event.message, received_at_ms) {
                    event.timestamp = Some(ts);
                }
            } else if event.timestamp.is_none() {
                event.timestamp = sync.to_absolute_time(event.group().unwrap_or(0), None);
            }
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clock_then_timestamp() {
        let mut sync = JitterReductionSynchronizer::default();
        sync.on_jr_clock(0, 100, 1000.0);
        assert_eq!(sync.on_jr_timestamp(0, 150), Some(1050.0));
        assert_eq!(sync.to_absolute_time(0, None), Some(1050.0));
        assert_eq!(sync.to_absolute_time(0, Some(200)), Some(1100.0));
        assert_eq!(sync.clock_value(0), Some(100));
    }

    #[test]
    fn test_no_clock_is_none() {
        let mut sync = JitterReductionSynchronizer::default();
        assert_eq!(sync.to_absolute_time(0, Some(5)), None);
        assert_eq!(sync.on_jr_timestamp(0, 5), None);
        sync.on_jr_clock(1, 0, 10.0);
        assert_eq!(sync.to_absolute_time(0, None), None);
        // base known, no timestamp yet
        assert_eq!(sync.to_absolute_time(1, None), None);
    }

    #[test]
    fn test_new_clock_clears_last_timestamp() {
        let mut sync = JitterReductionSynchronizer::default();
        sync.on_jr_clock(0, 0, 0.0);
        sync.on_jr_timestamp(0, 10);
        sync.on_jr_clock(0, 0, 500.0);
        assert_eq!(sync.to_absolute_time(0, None), None);
    }

    #[test]
    fn test_custom_unit() {
        let mut sync = JitterReductionSynchronizer::new(JitterConfig { unit_ms: 0.032 }).unwrap();
        sync.on_jr_clock(2, 1000, 100.0);
        let at = sync.on_jr_timestamp(2, 1500).unwrap();
        assert_relative_eq!(at, 116.0, epsilon = 1e-9);
        assert!(JitterReductionSynchronizer::new(JitterConfig { unit_ms: 0.0 }).is_err());
    }

    #[test]
    fn test_forget_and_reset() {
        let mut sync = JitterReductionSynchronizer::default();
        sync.on_jr_clock(0, 0, 0.0);
        sync.on_jr_clock(1, 0, 0.0);
        sync.forget_group(0);
        assert_eq!(sync.clock_value(0), None);
        assert_eq!(sync.clock_value(1), Some(0));
        sync.reset();
        assert_eq!(sync.clock_value(1), None);
    }

    #[test]
    fn test_apply_batch() {
        let mut sync = JitterReductionSynchronizer::default();
        let events: Vec<Midi2Event> = vec![
            Midi2Message::note_on(0, 0, 60, 1).into(),
            Midi2Message::jr_clock(0, 100).into(),
            Midi2Message::jr_timestamp(0, 150).into(),
            Midi2Message::note_on(0, 0, 61, 1).into(),
            Midi2Event::new(Midi2Message::note_on(0, 0, 62, 1)).at(7.0),
            Midi2Message::note_on(1, 0, 63, 1).into(),
        ];
        let out = apply_jitter_reduction(&events, &mut sync, 1000.0);
        let stamps: Vec<_> = out.iter().map(|e| e.timestamp).collect();
        assert_eq!(
            stamps,
            vec![None, None, Some(1050.0), Some(1050.0), Some(7.0), None]
        );
    }
}
