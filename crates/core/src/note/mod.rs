//! Runtime notes: generational slot storage and the pure position law.

use crate::{FieldConfig, NoteDescriptor};

/// Stable reference to a spawned note. A handle stays unique even after its
/// slot is reused, because every reuse bumps the slot generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteHandle {
    index: u32,
    generation: u32,
}

impl NoteHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Mutable record for a note between spawn and despawn. Position is never
/// stored; it is derived from song time by [`FieldGeometry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteState {
    pub descriptor: NoteDescriptor,
    /// Onset on the song clock (authored time plus global offset).
    pub onset: f64,
}

impl NoteState {
    pub fn new(descriptor: NoteDescriptor, onset: f64) -> Self {
        Self { descriptor, onset }
    }

    pub fn lane(&self) -> usize {
        self.descriptor.lane
    }

    pub fn duration(&self) -> f64 {
        self.descriptor.duration
    }

    pub fn is_hold(&self) -> bool {
        self.descriptor.is_hold()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    note: Option<NoteState>,
}

/// Arena that owns every live note. Freed slots are recycled through a free
/// list instead of an engine object pool.
#[derive(Debug, Default)]
pub struct NoteArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NoteArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, note: NoteState) -> NoteHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.note = Some(note);
            return NoteHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            note: Some(note),
        });
        NoteHandle {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, handle: NoteHandle) -> Option<&NoteState> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.note.as_ref())
    }

    /// Takes the note out of the arena. Returns `None` for stale handles, so
    /// a note can only ever be released once.
    pub fn remove(&mut self, handle: NoteHandle) -> Option<NoteState> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let note = slot.note.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(note)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

/// Vertical extent of a note on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEnvelope {
    pub bottom: f64,
    pub top: f64,
}

/// Position law shared by judgement and presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldGeometry {
    pub hit_y: f64,
    pub speed: f64,
    pub game_over_y: f64,
}

impl FieldGeometry {
    pub fn from_config(field: &FieldConfig) -> Self {
        Self {
            hit_y: field.hit_y,
            speed: field.speed,
            game_over_y: field.game_over_y,
        }
    }

    /// Leading edge: equals `hit_y` exactly when `song_time == onset`.
    #[inline]
    pub fn leading_y(&self, onset: f64, song_time: f64) -> f64 {
        self.hit_y + (onset - song_time) * self.speed
    }

    /// Trailing edge of a hold; identical to the leading edge for taps.
    #[inline]
    pub fn trailing_y(&self, onset: f64, duration: f64, song_time: f64) -> f64 {
        self.hit_y + (onset + duration - song_time) * self.speed
    }

    pub fn envelope(&self, note: &NoteState, song_time: f64) -> NoteEnvelope {
        let head = self.leading_y(note.onset, song_time);
        let tail = self.trailing_y(note.onset, note.duration(), song_time);
        NoteEnvelope {
            bottom: head.min(tail),
            top: head.max(tail),
        }
    }

    pub fn has_escaped(&self, onset: f64, song_time: f64) -> bool {
        self.leading_y(onset, song_time) < self.game_over_y
    }
}

/// Horizontal centre of `lane` on an input surface of `width` split into
/// `lane_count` equal bins.
pub fn lane_anchor_x(lane: usize, lane_count: usize, width: f64) -> f64 {
    let lane_count = lane_count.max(1);
    (lane as f64 + 0.5) * width / lane_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> FieldGeometry {
        FieldGeometry {
            hit_y: -2.5,
            speed: 7.0,
            game_over_y: -6.0,
        }
    }

    #[test]
    fn leading_edge_sits_on_hit_line_at_onset() {
        let field = geometry();
        for onset in [0.0, 0.37, 12.125, 301.9] {
            assert!((field.leading_y(onset, onset) - field.hit_y).abs() < 1e-9);
        }
    }

    #[test]
    fn hold_envelope_spans_head_to_tail() {
        let field = geometry();
        let note = NoteState::new(NoteDescriptor::hold(0, 2.0, 1.0), 2.0);

        let before = field.envelope(&note, 1.0);
        assert!((before.bottom - (field.hit_y + 7.0)).abs() < 1e-9);
        assert!((before.top - (field.hit_y + 14.0)).abs() < 1e-9);

        let during = field.envelope(&note, 2.5);
        assert!(during.bottom < field.hit_y && during.top > field.hit_y);
    }

    #[test]
    fn notes_escape_below_game_over_line() {
        let field = geometry();
        // Leading edge needs (hit_y - game_over_y) / speed = 0.5s past onset.
        assert!(!field.has_escaped(1.0, 1.49));
        assert!(field.has_escaped(1.0, 1.51));
    }

    #[test]
    fn stale_handles_cannot_release_twice() {
        let mut arena = NoteArena::new();
        let first = arena.insert(NoteState::new(NoteDescriptor::tap(0, 1.0), 1.0));

        assert!(arena.remove(first).is_some());
        assert!(arena.remove(first).is_none());

        let second = arena.insert(NoteState::new(NoteDescriptor::tap(1, 2.0), 2.0));
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).map(NoteState::lane), Some(1));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn lane_anchors_are_bin_centres() {
        assert!((lane_anchor_x(0, 4, 1.0) - 0.125).abs() < 1e-12);
        assert!((lane_anchor_x(3, 4, 1.0) - 0.875).abs() < 1e-12);
    }
}
