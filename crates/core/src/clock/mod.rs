//! Song time anchored to the audio device clock.

use crate::{AudioClip, AudioDevice, Result};

/// Converts device time into song time.
///
/// Before [`SongClock::start`] the song time is pinned to zero. Once started
/// it is `device.now() - start_instant`, which is negative until the scheduled
/// first sample actually plays. Callers treat negative values as "not begun".
#[derive(Debug)]
pub struct SongClock<D> {
    device: D,
    safety_delay: f64,
    start_instant: Option<f64>,
}

impl<D: AudioDevice> SongClock<D> {
    pub fn new(device: D, safety_delay: f64) -> Self {
        Self {
            device,
            safety_delay: safety_delay.max(0.0),
            start_instant: None,
        }
    }

    /// Arms `clip` to play at `now + safety_delay + offset_seconds`.
    ///
    /// Non-blocking. A device that refuses to schedule is a fatal error for
    /// the caller; the clock stays unstarted and nothing is retried.
    pub fn start(&mut self, clip: &AudioClip, offset_seconds: f64) -> Result<f64> {
        let start_instant = self.device.now() + self.safety_delay + offset_seconds;
        self.device.schedule(clip, start_instant)?;
        self.start_instant = Some(start_instant);
        tracing::debug!(clip = %clip.id, start_instant, "playback scheduled");
        Ok(start_instant)
    }

    /// Halts output and reverts song time to zero.
    pub fn stop(&mut self) {
        self.device.stop();
        self.start_instant = None;
    }

    pub fn song_time(&self) -> f64 {
        match self.start_instant {
            Some(start) => self.device.now() - start,
            None => 0.0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.start_instant.is_some()
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LanebeatError, SimulatedDevice};

    fn clip() -> AudioClip {
        AudioClip::new("song.ogg", 10.0, 1000)
    }

    #[test]
    fn reads_zero_until_started() {
        let device = SimulatedDevice::new(1000);
        let clock = SongClock::new(device.clone(), 0.1);

        device.advance(5000);
        assert_eq!(clock.song_time(), 0.0);
        assert!(!clock.is_started());
    }

    #[test]
    fn song_time_is_negative_until_the_scheduled_instant() {
        let device = SimulatedDevice::new(1000);
        device.advance(2000);
        let mut clock = SongClock::new(device.clone(), 0.1);

        let start = clock.start(&clip(), 0.05).unwrap();
        assert!((start - 2.15).abs() < 1e-9);
        assert!((clock.song_time() + 0.15).abs() < 1e-9);

        device.advance(150);
        assert!(clock.song_time().abs() < 1e-9);
        device.advance(1020);
        assert!((clock.song_time() - 1.02).abs() < 1e-9);
    }

    #[test]
    fn stop_reverts_to_zero_and_silences_device() {
        let device = SimulatedDevice::new(1000);
        let mut clock = SongClock::new(device.clone(), 0.1);
        clock.start(&clip(), 0.0).unwrap();
        device.advance(500);
        assert!(clock.device().is_playing());

        clock.stop();
        assert_eq!(clock.song_time(), 0.0);
        assert!(!device.is_playing());
    }

    #[test]
    fn scheduling_failure_leaves_clock_unstarted() {
        let device = SimulatedDevice::new(1000);
        device.refuse_next_schedule("exclusive mode lost").unwrap();
        let mut clock = SongClock::new(device, 0.1);

        let err = clock.start(&clip(), 0.0).unwrap_err();
        assert!(matches!(err, LanebeatError::Scheduling(_)));
        assert!(!clock.is_started());
        assert_eq!(clock.song_time(), 0.0);
    }
}
