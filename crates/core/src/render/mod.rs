use std::f64::consts::PI;

use crate::{EndReason, NoteHandle, NoteState, ScoreSummary, Tier};

/// Presentation collaborator driven by the session. Sprites, particles and
/// text live behind this trait; every method defaults to doing nothing.
pub trait Presentation {
    /// A note became active. `x` is the lane anchor, `y` its leading edge now.
    fn note_spawned(&mut self, _handle: NoteHandle, _note: &NoteState, _x: f64, _y: f64) {}

    /// The note is gone for good; its handle will never be used again.
    fn note_despawned(&mut self, _handle: NoteHandle) {}

    fn hit(&mut self, _lane: usize, _tier: Tier, _combo: u32) {}

    fn miss(&mut self, _lane: usize) {}

    /// Called exactly once per session.
    fn game_over(&mut self, _reason: EndReason, _summary: &ScoreSummary) {}
}

/// Presentation that ignores everything, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresentation;

impl Presentation for NullPresentation {}

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationCall {
    Spawned { handle: NoteHandle, lane: usize, x: f64, y: f64 },
    Despawned(NoteHandle),
    Hit { lane: usize, tier: Tier, combo: u32 },
    Miss { lane: usize },
    GameOver(EndReason),
}

/// Records every presentation call in order.
#[derive(Debug, Default, Clone)]
pub struct PresentationLog {
    calls: Vec<PresentationCall>,
}

impl PresentationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[PresentationCall] {
        &self.calls
    }

    pub fn despawned(&self) -> Vec<NoteHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PresentationCall::Despawned(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn game_overs(&self) -> Vec<EndReason> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                PresentationCall::GameOver(reason) => Some(*reason),
                _ => None,
            })
            .collect()
    }

    pub fn misses(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, PresentationCall::Miss { .. }))
            .count()
    }
}

impl Presentation for PresentationLog {
    fn note_spawned(&mut self, handle: NoteHandle, note: &NoteState, x: f64, y: f64) {
        self.calls.push(PresentationCall::Spawned {
            handle,
            lane: note.lane(),
            x,
            y,
        });
    }

    fn note_despawned(&mut self, handle: NoteHandle) {
        self.calls.push(PresentationCall::Despawned(handle));
    }

    fn hit(&mut self, lane: usize, tier: Tier, combo: u32) {
        self.calls.push(PresentationCall::Hit { lane, tier, combo });
    }

    fn miss(&mut self, lane: usize) {
        self.calls.push(PresentationCall::Miss { lane });
    }

    fn game_over(&mut self, reason: EndReason, _summary: &ScoreSummary) {
        self.calls.push(PresentationCall::GameOver(reason));
    }
}

/// Scale of a judgement "pop": rises from 1.0 to `peak` and back over
/// `duration` seconds after the trigger, 1.0 outside that span.
pub fn pop_scale(elapsed: f64, duration: f64, peak: f64) -> f64 {
    if duration <= 0.0 || !(0.0..duration).contains(&elapsed) {
        return 1.0;
    }
    1.0 + (peak - 1.0) * (PI * elapsed / duration).sin()
}
