//! Reorders and holds inbound audio frames so the playback device can pull
//! PCM on a steady cadence despite variable network arrival times.

use std::collections::VecDeque;

use bytes::Bytes;

/// One held frame, keyed by its wire sequence number.
#[derive(Debug, Clone)]
struct Entry {
    seq: u32,
    payload: Bytes,
    waited_ticks: u32,
}

/// Tunables for one jitter buffer instance. Capacity is derived, not
/// configured directly: `clamp(round(target_delay_ms / frame_ms), 2, 32)`.
#[derive(Debug, Clone, Copy)]
pub struct JitterConfig {
    /// Target playout delay in milliseconds.
    pub target_delay_ms: u32,
    /// Duration of one audio frame in milliseconds.
    pub frame_ms: u32,
}

impl JitterConfig {
    fn capacity(&self) -> usize {
        let raw = (self.target_delay_ms as f64 / self.frame_ms as f64).round() as i64;
        raw.clamp(2, 32) as usize
    }
}

/// Running counters, cheap to clone for a UI status line.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JitterStats {
    pub received: u64,
    pub released: u64,
    pub dropped_late: u64,
    pub dropped_overflow: u64,
    pub silence_emitted: u64,
}

impl JitterStats {
    /// `dropped / (received + dropped)`; `0.0` before any frame has
    /// arrived.
    pub fn loss_estimate(&self) -> f64 {
        let dropped = self.dropped_late + self.dropped_overflow;
        let total = self.received + dropped;
        if total == 0 {
            0.0
        } else {
            dropped as f64 / total as f64
        }
    }
}

pub struct JitterBuffer {
    config: JitterConfig,
    capacity: usize,
    entries: VecDeque<Entry>,
    last_released_seq: Option<u32>,
    stats: JitterStats,
}

/// True if `a` precedes `b` in sequence order, honoring u32 wraparound
/// (the standard RTP-style half-range comparison).
fn seq_before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

impl JitterBuffer {
    pub fn new(config: JitterConfig) -> Self {
        let capacity = config.capacity();
        Self {
            config,
            capacity,
            entries: VecDeque::with_capacity(capacity),
            last_released_seq: None,
            stats: JitterStats::default(),
        }
    }

    pub fn stats(&self) -> JitterStats {
        self.stats
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert one arrived frame. Drops as late if it trails the last
    /// released sequence by more than the buffer's capacity (accounting
    /// for wrap); drops the oldest held entry if the buffer is full;
    /// otherwise inserts in `seq` order.
    pub fn insert(&mut self, seq: u32, payload: Bytes) {
        self.stats.received += 1;

        if let Some(last) = self.last_released_seq {
            if seq_before(seq, last) {
                let behind = last.wrapping_sub(seq);
                if behind > self.capacity as u32 {
                    self.stats.dropped_late += 1;
                    return;
                }
            }
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.stats.dropped_overflow += 1;
        }

        let position = self
            .entries
            .iter()
            .position(|e| seq_before(seq, e.seq))
            .unwrap_or(self.entries.len());
        self.entries.insert(
            position,
            Entry {
                seq,
                payload,
                waited_ticks: 0,
            },
        );
    }

    /// One playback tick, called every `frame_ms`. Releases the
    /// lowest-`seq` entry (returned alongside its sequence number) if the
    /// buffer holds at least half capacity or the oldest entry has waited
    /// the full target delay; otherwise emits `frame_ms` of silence. Never
    /// blocks.
    pub fn tick(&mut self) -> Option<(u32, Bytes)> {
        for entry in self.entries.iter_mut() {
            entry.waited_ticks += 1;
        }

        let waited_enough = self
            .entries
            .front()
            .map(|e| e.waited_ticks * self.config.frame_ms >= self.config.target_delay_ms)
            .unwrap_or(false);
        let half_full = self.entries.len() >= (self.capacity / 2).max(1);

        if half_full || waited_enough {
            if let Some(entry) = self.entries.pop_front() {
                self.last_released_seq = Some(entry.seq);
                self.stats.released += 1;
                return Some((entry.seq, entry.payload));
            }
        }

        self.stats.silence_emitted += 1;
        None
    }
}
