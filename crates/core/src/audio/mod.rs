use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::{LanebeatError, Result};

/// Handle to a decoded audio asset. Decoding itself happens outside the core;
/// the session only needs to know which asset it is and how long it plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub id: String,
    pub length_seconds: f64,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(id: impl Into<String>, length_seconds: f64, sample_rate: u32) -> Self {
        Self {
            id: id.into(),
            length_seconds,
            sample_rate,
        }
    }
}

/// Output device that owns the hardware audio clock.
///
/// `now` must be monotonic and advance in lock-step with the samples the
/// device actually plays, never with wall time.
pub trait AudioDevice {
    /// Current device time in seconds.
    fn now(&self) -> f64;

    /// Arms `clip` so that its first sample plays exactly at device time `at`.
    /// Returns immediately; playback starts asynchronously on the device.
    fn schedule(&mut self, clip: &AudioClip, at: f64) -> Result<()>;

    /// Silences output immediately.
    fn stop(&mut self);

    /// Whether the device is currently producing samples for the armed clip.
    fn is_playing(&self) -> bool;
}

#[derive(Debug, Default)]
struct Playback {
    window: Option<(f64, f64)>,
    refuse_next: Option<String>,
}

/// Device stand-in that counts rendered frames instead of talking to hardware.
///
/// Clones share the same frame counter, so a test or a headless driver can
/// keep one handle to advance time while the session owns another.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    sample_rate: u32,
    frames: Arc<AtomicU64>,
    playback: Arc<Mutex<Playback>>,
}

impl SimulatedDevice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames: Arc::new(AtomicU64::new(0)),
            playback: Arc::new(Mutex::new(Playback::default())),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Renders `frames` sample frames, moving the device clock forward.
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Renders as many whole frames as fit in `seconds`.
    pub fn advance_seconds(&self, seconds: f64) {
        if seconds > 0.0 {
            self.advance((seconds * f64::from(self.sample_rate)).round() as u64);
        }
    }

    /// Moves the device clock to exactly `seconds` if that lies in the future.
    pub fn advance_to(&self, seconds: f64) {
        let target = (seconds * f64::from(self.sample_rate)).round() as u64;
        self.frames.fetch_max(target, Ordering::AcqRel);
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Makes the next [`AudioDevice::schedule`] call fail with `reason`.
    pub fn refuse_next_schedule(&self, reason: impl Into<String>) -> Result<()> {
        self.lock_playback()?.refuse_next = Some(reason.into());
        Ok(())
    }

    /// Device time at which the armed clip starts, if any.
    pub fn scheduled_start(&self) -> Option<f64> {
        self.lock_playback()
            .ok()
            .and_then(|playback| playback.window.map(|(start, _)| start))
    }

    fn lock_playback(&self) -> Result<MutexGuard<'_, Playback>> {
        self.playback
            .lock()
            .map_err(|_| LanebeatError::msg("simulated playback state has been poisoned"))
    }
}

impl AudioDevice for SimulatedDevice {
    fn now(&self) -> f64 {
        self.frames_rendered() as f64 / f64::from(self.sample_rate)
    }

    fn schedule(&mut self, clip: &AudioClip, at: f64) -> Result<()> {
        let mut playback = self.lock_playback()?;
        if let Some(reason) = playback.refuse_next.take() {
            return Err(LanebeatError::Scheduling(reason));
        }
        playback.window = Some((at, clip.length_seconds.max(0.0)));
        Ok(())
    }

    fn stop(&mut self) {
        if let Ok(mut playback) = self.playback.lock() {
            playback.window = None;
        }
    }

    fn is_playing(&self) -> bool {
        let now = self.now();
        self.playback
            .lock()
            .map(|playback| {
                playback
                    .window
                    .is_some_and(|(start, length)| now >= start && now < start + length)
            })
            .unwrap_or(false)
    }
}
