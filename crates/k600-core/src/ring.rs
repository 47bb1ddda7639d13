// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded, channel-tagged hit slots for the wire chambers.
//!
//! Models a front-end digitiser that can only multiplex a fixed number of
//! channels per event: a hit lands in the first slot already holding its
//! channel, else the first unset slot, else it is dropped and counted.

/// One multiplexed digitiser slot.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct HitSlot {
    channel: Option<u32>,
    energy: f64,
    weighted_z: f64,
    weighted_time: f64,
}

impl HitSlot {
    /// Channel id held by this slot (`None` = unset sentinel).
    pub const fn channel(&self) -> Option<u32> {
        self.channel
    }

    /// Channel id as the legacy signed column (`-1` when unset).
    pub fn channel_column(&self) -> i64 {
        self.channel.map_or(-1, i64::from)
    }

    /// Accumulated energy (keV).
    pub const fn energy(&self) -> f64 {
        self.energy
    }

    /// Energy-weighted drift coordinate sum (keV·mm).
    pub const fn weighted_z(&self) -> f64 {
        self.weighted_z
    }

    /// Energy-weighted time sum (keV·ns).
    pub const fn weighted_time(&self) -> f64 {
        self.weighted_time
    }

    /// Energy-weighted mean drift coordinate; `None` without energy.
    pub fn mean_z(&self) -> Option<f64> {
        (self.energy > 0.0).then(|| self.weighted_z / self.energy)
    }

    /// Energy-weighted mean time; `None` without energy.
    pub fn mean_time(&self) -> Option<f64> {
        (self.energy > 0.0).then(|| self.weighted_time / self.energy)
    }
}

/// Where a hit ended up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Stored in the slot at this position.
    Slot(usize),
    /// Every slot was held by another channel.
    Dropped,
}

/// Fixed-capacity slot array, reset every event.
#[derive(Debug, Clone)]
pub struct HitRingBuffer {
    slots: Vec<HitSlot>,
    dropped: usize,
}

impl HitRingBuffer {
    /// Creates `capacity` unset slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![HitSlot::default(); capacity],
            dropped: 0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Clears every slot back to the unset sentinel and zeroes the drop counter.
    pub fn reset(&mut self) {
        self.slots.fill(HitSlot::default());
        self.dropped = 0;
    }

    /// Adds `energy`, `energy * z` and `energy * time` to the slot for `channel`.
    pub fn assign(&mut self, channel: u32, energy: f64, z: f64, time: f64) -> Assignment {
        let found = self
            .slots
            .iter()
            .position(|s| s.channel.is_none() || s.channel == Some(channel));
        match found {
            Some(pos) => {
                let slot = &mut self.slots[pos];
                slot.channel = Some(channel);
                slot.energy += energy;
                slot.weighted_z += energy * z;
                slot.weighted_time += energy * time;
                Assignment::Slot(pos)
            }
            None => {
                self.dropped += 1;
                Assignment::Dropped
            }
        }
    }

    /// All slots, in assignment order.
    pub fn slots(&self) -> &[HitSlot] {
        &self.slots
    }

    /// Slots that hold a channel.
    pub fn occupied(&self) -> impl Iterator<Item = &HitSlot> + '_ {
        self.slots.iter().filter(|s| s.channel.is_some())
    }

    /// Hits dropped this event for lack of a slot.
    pub const fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifth_distinct_channel_is_dropped() {
        let mut ring = HitRingBuffer::new(4);
        let got: Vec<Assignment> = [5, 5, 7, 9, 11]
            .into_iter()
            .map(|ch| ring.assign(ch, 1.0, 0.0, 0.0))
            .collect();
        assert_eq!(
            got,
            vec![
                Assignment::Slot(0),
                Assignment::Slot(0),
                Assignment::Slot(1),
                Assignment::Slot(2),
                Assignment::Slot(3),
            ]
        );
        assert_eq!(ring.dropped(), 0);
        assert_eq!(ring.assign(13, 1.0, 0.0, 0.0), Assignment::Dropped);
        assert_eq!(ring.dropped(), 1);
    }

    #[test]
    fn full_buffer_still_updates_existing_channel() {
        let mut ring = HitRingBuffer::new(3);
        for ch in [5, 5, 7, 9] {
            ring.assign(ch, 2.0, 1.0, 10.0);
        }
        assert_eq!(ring.assign(11, 1.0, 0.0, 0.0), Assignment::Dropped);
        assert_eq!(ring.assign(5, 1.0, 3.0, 0.0), Assignment::Slot(0));
        let slot = ring.slots()[0];
        assert_eq!(slot.channel(), Some(5));
        assert_eq!(slot.energy(), 5.0);
        assert_eq!(slot.weighted_z(), 2.0 + 2.0 + 3.0);
    }

    #[test]
    fn weighted_means_guard_zero_energy() {
        let mut ring = HitRingBuffer::new(2);
        assert_eq!(ring.slots()[0].mean_z(), None);
        ring.assign(3, 2.0, 4.0, 8.0);
        ring.assign(3, 2.0, 8.0, 16.0);
        assert_eq!(ring.slots()[0].mean_z(), Some(6.0));
        assert_eq!(ring.slots()[0].mean_time(), Some(12.0));
    }

    #[test]
    fn reset_restores_unset_sentinel() {
        let mut ring = HitRingBuffer::new(2);
        ring.assign(1, 1.0, 1.0, 1.0);
        ring.assign(2, 1.0, 1.0, 1.0);
        ring.assign(3, 1.0, 1.0, 1.0);
        ring.reset();
        assert_eq!(ring.dropped(), 0);
        assert!(ring.slots().iter().all(|s| s.channel_column() == -1 && s.energy() == 0.0));
    }
}
