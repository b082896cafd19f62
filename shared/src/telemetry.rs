//! Acknowledgment-based latency and client frame-rate tracking
//!
//! Every rendered frame is stamped with an id and its send time. When the
//! remote side echoes that id back, the round trip is fed into a rolling
//! window from which average latency is derived, and the acknowledgment rate
//! gives an estimate of how many frames per second the client actually shows.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Number of round-trip samples kept in the rolling window.
pub const RTT_WINDOW: usize = 30;

/// Unacknowledged frames older than this are presumed lost.
pub const FRAME_RECORD_TTL: Duration = Duration::from_secs(5);

/// Rolling round-trip statistics for one session
#[derive(Debug, Clone)]
pub struct Telemetry {
    /// Most recent round-trip samples in milliseconds, oldest first
    samples: VecDeque<f32>,
    avg_latency_ms: f32,
    client_fps: f32,
    /// Acknowledgments received since `window_start`
    ack_count: u32,
    window_start: Instant,
}

impl Telemetry {
    pub fn new(now: Instant) -> Self {
        Self {
            samples: VecDeque::with_capacity(RTT_WINDOW),
            avg_latency_ms: 0.0,
            client_fps: 0.0,
            ack_count: 0,
            window_start: now,
        }
    }

    /// Records one acknowledged round trip
    ///
    /// The window drops its oldest sample once it holds more than
    /// [`RTT_WINDOW`] entries and the average is recomputed from what remains.
    /// The client frame rate is refreshed once at least a second has passed
    /// since the current counting window opened.
    pub fn record_rtt(&mut self, rtt: Duration, now: Instant) {
        self.samples.push_back(rtt.as_secs_f32() * 1000.0);
        while self.samples.len() > RTT_WINDOW {
            self.samples.pop_front();
        }

        let sum: f32 = self.samples.iter().sum();
        self.avg_latency_ms = sum / self.samples.len() as f32;

        self.ack_count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.client_fps = self.ack_count as f32 / elapsed.as_secs_f32();
            self.ack_count = 0;
            self.window_start = now;
        }
    }

    pub fn average_latency_ms(&self) -> f32 {
        self.avg_latency_ms
    }

    pub fn client_fps(&self) -> f32 {
        self.client_fps
    }

    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples.iter().copied()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Send times of frames still awaiting acknowledgment
#[derive(Debug, Clone, Default)]
pub struct FrameLog {
    sent: HashMap<u64, Instant>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, frame_id: u64, sent_at: Instant) {
        self.sent.insert(frame_id, sent_at);
    }

    /// Removes and returns the send time of `frame_id`, if still tracked.
    pub fn take(&mut self, frame_id: u64) -> Option<Instant> {
        self.sent.remove(&frame_id)
    }

    /// Drops every record older than [`FRAME_RECORD_TTL`].
    pub fn sweep(&mut self, now: Instant) {
        self.sent
            .retain(|_, sent_at| now.saturating_duration_since(*sent_at) <= FRAME_RECORD_TTL);
    }

    pub fn contains(&self, frame_id: u64) -> bool {
        self.sent.contains_key(&frame_id)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
