//! Bounded duplicate filter for inbound message ids.

/// How many recent ids the reader remembers.
pub const DEFAULT_CAPACITY: usize = 100;

/// Remembers the most recent inbound message ids.
///
/// Once full, the smallest stored id is evicted for each new one, so an id
/// lower than everything remembered is treated as a replay as well.
#[derive(Debug)]
pub struct MessageIdBuf {
    ids: Vec<i64>,
    cap: usize,
}

impl MessageIdBuf {
    pub fn new(cap: usize) -> Self {
        Self { ids: Vec::with_capacity(cap), cap: cap.max(1) }
    }

    /// Record `id`. Returns `false` if the message must be discarded.
    pub fn consume(&mut self, id: i64) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        if self.ids.len() < self.cap {
            self.ids.push(id);
            return true;
        }

        let (min_idx, &min) = match self.ids.iter().enumerate().min_by_key(|&(_, v)| *v) {
            Some(m) => m,
            None => return true,
        };
        if id < min {
            return false;
        }
        self.ids[min_idx] = id;
        true
    }
}

impl Default for MessageIdBuf {
    fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}
