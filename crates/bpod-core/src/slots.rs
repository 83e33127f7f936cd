//! Presence table for serial messages stored on the device.

use std::fmt;

use crate::protocol::MAX_SERIAL_MESSAGES;

/// Fixed-size bitset of the 255 serial-message slots (ids 1..=255).
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSlots {
    bits: [u64; 4],
}

impl MessageSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid slot ids are 1..=255.
    pub fn is_valid_id(id: u32) -> bool {
        (1..=MAX_SERIAL_MESSAGES as u32).contains(&id)
    }

    pub fn mark(&mut self, id: u8) {
        if id == 0 {
            return;
        }
        let (word, bit) = Self::position(id);
        self.bits[word] |= 1 << bit;
    }

    pub fn is_loaded(&self, id: u8) -> bool {
        if id == 0 {
            return false;
        }
        let (word, bit) = Self::position(id);
        self.bits[word] & (1 << bit) != 0
    }

    pub fn clear(&mut self) {
        self.bits = [0; 4];
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Loaded ids in ascending order.
    pub fn loaded(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=u8::MAX).filter(|&id| self.is_loaded(id))
    }

    fn position(id: u8) -> (usize, u32) {
        let index = id as usize - 1;
        (index / 64, (index % 64) as u32)
    }
}

impl fmt::Debug for MessageSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.loaded()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(!MessageSlots::is_valid_id(0));
        assert!(MessageSlots::is_valid_id(1));
        assert!(MessageSlots::is_valid_id(255));
        assert!(!MessageSlots::is_valid_id(256));
    }

    #[test]
    fn test_mark_and_query() {
        let mut slots = MessageSlots::new();
        slots.mark(1);
        slots.mark(64);
        slots.mark(65);
        slots.mark(255);

        assert!(slots.is_loaded(1));
        assert!(slots.is_loaded(64));
        assert!(slots.is_loaded(65));
        assert!(slots.is_loaded(255));
        assert!(!slots.is_loaded(2));
        assert_eq!(slots.count(), 4);
        assert_eq!(slots.loaded().collect::<Vec<_>>(), vec![1, 64, 65, 255]);

        slots.clear();
        assert_eq!(slots.count(), 0);
    }

    #[test]
    fn test_zero_is_never_loaded() {
        let mut slots = MessageSlots::new();
        slots.mark(0);
        assert!(!slots.is_loaded(0));
        assert_eq!(slots.count(), 0);
    }
}
