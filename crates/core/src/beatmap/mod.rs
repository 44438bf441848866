use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LanebeatError, Result};

/// One note as authored in the beatmap file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteDescriptor {
    pub lane: usize,
    /// Seconds from song start, before the beatmap's global offset is applied.
    pub time: f64,
    /// Zero for taps, positive for holds.
    #[serde(default)]
    pub duration: f64,
}

impl NoteDescriptor {
    pub fn tap(lane: usize, time: f64) -> Self {
        Self {
            lane,
            time,
            duration: 0.0,
        }
    }

    pub fn hold(lane: usize, time: f64, duration: f64) -> Self {
        Self {
            lane,
            time,
            duration,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.duration > 0.0
    }
}

/// Validated, onset-sorted note chart for one song.
///
/// Construct through [`Beatmap::new`] or [`Beatmap::from_json_str`]; both
/// validate and sort, after which the beatmap is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beatmap {
    pub song_id: String,
    pub bpm: f64,
    pub audio_file: String,
    #[serde(default)]
    pub global_offset: f64,
    pub spawn_lead_time: f64,
    pub lanes: usize,
    #[serde(default)]
    notes: Vec<NoteDescriptor>,
}

impl Beatmap {
    pub fn new(
        song_id: impl Into<String>,
        bpm: f64,
        audio_file: impl Into<String>,
        global_offset: f64,
        spawn_lead_time: f64,
        lanes: usize,
        notes: Vec<NoteDescriptor>,
    ) -> Result<Self> {
        let mut beatmap = Self {
            song_id: song_id.into(),
            bpm,
            audio_file: audio_file.into(),
            global_offset,
            spawn_lead_time,
            lanes,
            notes,
        };
        beatmap.validate()?;
        beatmap.sort_notes();
        Ok(beatmap)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut beatmap: Self = serde_json::from_str(text)
            .map_err(|err| LanebeatError::InvalidBeatmap(err.to_string()))?;
        beatmap.validate()?;
        beatmap.sort_notes();
        Ok(beatmap)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.song_id.trim().is_empty() {
            return Err(malformed("songId must not be empty"));
        }
        if self.audio_file.trim().is_empty() {
            return Err(malformed("audioFile must not be empty"));
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(malformed(format!("bpm must be positive, got {}", self.bpm)));
        }
        if !self.global_offset.is_finite() {
            return Err(malformed("globalOffset must be finite"));
        }
        if !(self.spawn_lead_time.is_finite() && self.spawn_lead_time > 0.0) {
            return Err(malformed(format!(
                "spawnLeadTime must be positive, got {}",
                self.spawn_lead_time
            )));
        }
        if self.lanes == 0 {
            return Err(malformed("lanes must be at least 1"));
        }

        for (index, note) in self.notes.iter().enumerate() {
            if note.lane >= self.lanes {
                return Err(malformed(format!(
                    "note {index} uses lane {} but the beatmap has {} lanes",
                    note.lane, self.lanes
                )));
            }
            if !(note.time.is_finite() && note.time >= 0.0) {
                return Err(malformed(format!("note {index} has invalid time {}", note.time)));
            }
            if !(note.duration.is_finite() && note.duration >= 0.0) {
                return Err(malformed(format!(
                    "note {index} has invalid duration {}",
                    note.duration
                )));
            }
        }
        Ok(())
    }

    // `sort_by` is stable, so equal onsets keep their authored order.
    pub(crate) fn sort_notes(&mut self) {
        self.notes.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    pub fn notes(&self) -> &[NoteDescriptor] {
        &self.notes
    }

    /// Onset of `note` on the song clock, with the global offset applied.
    pub fn onset_of(&self, note: &NoteDescriptor) -> f64 {
        note.time + self.global_offset
    }

    pub fn lane_note_count(&self, lane: usize) -> usize {
        self.notes.iter().filter(|note| note.lane == lane).count()
    }

    /// Song time at which the last note (including hold tails) ends.
    pub fn duration(&self) -> f64 {
        self.notes
            .iter()
            .map(|note| self.onset_of(note) + note.duration)
            .fold(0.0, f64::max)
    }
}

fn malformed(message: impl Into<String>) -> LanebeatError {
    LanebeatError::InvalidBeatmap(message.into())
}
