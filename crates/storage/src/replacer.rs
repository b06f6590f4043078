/// Identifies a frame in the buffer pool.
pub type FrameId = usize;

/// Eviction policy for buffer pool frames.
pub trait Replacer {
    /// Chooses a victim frame for eviction and drops it from the candidate set.
    fn victim(&mut self) -> Option<FrameId>;

    /// Pins a frame, removing it from eviction consideration.
    fn pin(&mut self, frame_id: FrameId);

    /// Unpins a frame, adding it to eviction consideration.
    fn unpin(&mut self, frame_id: FrameId);

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;
}

/// Second-chance (CLOCK) replacer over a fixed frame-id space.
///
/// A frame joins the clock on `unpin` with its reference bit set. The hand
/// sweeps the frame ids in order; a candidate with the bit set loses the bit
/// and survives the pass, a candidate without it is the victim.
#[derive(Debug)]
pub struct ClockReplacer {
    clock_hand: usize,
    in_clock: Vec<bool>,
    ref_bits: Vec<bool>,
    candidates: usize,
}

impl ClockReplacer {
    /// Creates a clock covering frame ids `0..num_frames`.
    pub fn new(num_frames: usize) -> Self {
        Self {
            clock_hand: 0,
            in_clock: vec![false; num_frames],
            ref_bits: vec![false; num_frames],
            candidates: 0,
        }
    }

    /// Number of frame ids the clock covers.
    pub fn capacity(&self) -> usize {
        self.in_clock.len()
    }

    fn advance(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.in_clock.len();
    }
}

impl Replacer for ClockReplacer {
    fn victim(&mut self) -> Option<FrameId> {
        // With at least one candidate the hand finds a victim within two sweeps.
        while self.size() != 0 {
            let hand = self.clock_hand;
            self.advance();
            if !self.in_clock[hand] {
                continue;
            }
            if self.ref_bits[hand] {
                self.ref_bits[hand] = false;
                continue;
            }
            self.in_clock[hand] = false;
            self.candidates -= 1;
            return Some(hand);
        }
        None
    }

    fn pin(&mut self, frame_id: FrameId) {
        if frame_id >= self.capacity() {
            return;
        }
        if self.in_clock[frame_id] {
            self.in_clock[frame_id] = false;
            self.candidates -= 1;
        }
        self.ref_bits[frame_id] = false;
    }

    fn unpin(&mut self, frame_id: FrameId) {
        if frame_id >= self.capacity() {
            return;
        }
        if !self.in_clock[frame_id] {
            self.in_clock[frame_id] = true;
            self.candidates += 1;
        }
        self.ref_bits[frame_id] = true;
    }

    fn size(&self) -> usize {
        self.candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_replacer_sample() {
        let mut replacer = ClockReplacer::new(7);

        for frame_id in 1..=6 {
            replacer.unpin(frame_id);
        }
        replacer.unpin(1);
        assert_eq!(replacer.size(), 6);

        // First sweep strips every reference bit, second sweep evicts in order.
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));

        replacer.pin(3);
        replacer.pin(4);
        assert_eq!(replacer.size(), 2);

        replacer.unpin(4);

        assert_eq!(replacer.victim(), Some(5));
        assert_eq!(replacer.victim(), Some(6));
        assert_eq!(replacer.victim(), Some(4));
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_empty_clock_has_no_victim() {
        let mut replacer = ClockReplacer::new(3);
        assert_eq!(replacer.victim(), None);
        replacer.unpin(0);
        replacer.pin(0);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_pin_and_unpin_are_idempotent() {
        let mut replacer = ClockReplacer::new(4);
        replacer.unpin(2);
        replacer.unpin(2);
        assert_eq!(replacer.size(), 1);
        replacer.pin(2);
        replacer.pin(2);
        assert_eq!(replacer.size(), 0);
        replacer.pin(3);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_reference_bit_grants_second_chance() {
        let mut replacer = ClockReplacer::new(3);
        replacer.unpin(0);
        replacer.unpin(1);
        assert_eq!(replacer.victim(), Some(0));

        // Hand now rests at 1 with its bit already cleared; 0 rejoins with a fresh bit.
        replacer.unpin(0);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(0));
    }

    #[test]
    fn test_out_of_range_frames_are_ignored() {
        let mut replacer = ClockReplacer::new(2);
        replacer.unpin(5);
        replacer.pin(5);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.capacity(), 2);
    }
}
