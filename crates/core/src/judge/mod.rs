//! Per-lane judgement: tap timing tiers, hold coverage tiers, and the
//! IDLE/HOLDING state machine that consumes presses against a note queue.
//!
//! A lane never calls back into the session directly. Every outcome is
//! pushed as a [`LaneEvent`] into an outbox the caller drains, which keeps
//! note ownership explicit: once a lane emits [`LaneEvent::Despawn`] for a
//! handle it has already forgotten that note.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{FieldGeometry, GameConfig, HoldThresholds, JudgeWindows, NoteHandle, NoteState};

/// Guards the hold fraction against zero-length holds.
const HOLD_EPSILON: f64 = 1e-6;

/// Outcome classification. `Miss` is a tier like any other, not an absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Excellent,
    Great,
    Good,
    Miss,
}

/// Classifies a tap press `dt = song_time - onset` seconds off its onset.
///
/// Returns `None` when the press is too early to judge anything. Anything
/// later than the good window consumes the note as a miss.
pub fn classify_tap(dt: f64, windows: &JudgeWindows) -> Option<Tier> {
    if dt < -windows.good {
        return None;
    }
    let off = dt.abs();
    let tier = if off <= windows.excellent {
        Tier::Excellent
    } else if off <= windows.great {
        Tier::Great
    } else if off <= windows.good {
        Tier::Good
    } else {
        Tier::Miss
    };
    Some(tier)
}

/// Fraction of a hold's duration that was actually held, in `[0, 1]`.
pub fn hold_fraction(held: f64, duration: f64) -> f64 {
    (held / duration.max(HOLD_EPSILON)).clamp(0.0, 1.0)
}

pub fn classify_hold(fraction: f64, thresholds: &HoldThresholds) -> Tier {
    if fraction >= thresholds.excellent {
        Tier::Excellent
    } else if fraction >= thresholds.great {
        Tier::Great
    } else if fraction >= thresholds.good {
        Tier::Good
    } else {
        Tier::Miss
    }
}

/// Everything a lane needs to judge, copied out of [`GameConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeRules {
    pub windows: JudgeWindows,
    pub hold: HoldThresholds,
    pub field: FieldGeometry,
}

impl JudgeRules {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            windows: config.judge,
            hold: config.hold,
            field: FieldGeometry::from_config(&config.field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    Tap,
    Hold,
}

/// A judgement produced by a lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgement {
    pub lane: usize,
    pub note: NoteHandle,
    pub kind: NoteKind,
    pub tier: Tier,
    /// Press offset from onset for taps, covered fraction for holds.
    pub measure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneEvent {
    Judged(Judgement),
    /// Ownership of the note passes back to the session.
    Despawn(NoteHandle),
    /// The lane head crossed the game-over line. Terminal for every lane.
    GameOver { lane: usize, note: NoteHandle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Idle,
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedNote {
    pub handle: NoteHandle,
    pub onset: f64,
    pub duration: f64,
}

impl QueuedNote {
    fn kind(&self) -> NoteKind {
        if self.duration > 0.0 {
            NoteKind::Hold
        } else {
            NoteKind::Tap
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveHold {
    note: QueuedNote,
    end: f64,
    held: f64,
    last_sample: f64,
}

/// Judgement state for a single lane.
#[derive(Debug)]
pub struct LaneJudge {
    lane: usize,
    queue: VecDeque<QueuedNote>,
    hold: Option<ActiveHold>,
    pressing: bool,
    /// Head note that already received its late miss.
    penalized: Option<NoteHandle>,
}

impl LaneJudge {
    pub fn new(lane: usize) -> Self {
        Self {
            lane,
            queue: VecDeque::new(),
            hold: None,
            pressing: false,
            penalized: None,
        }
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn state(&self) -> LaneState {
        if self.hold.is_some() {
            LaneState::Holding
        } else {
            LaneState::Idle
        }
    }

    pub fn is_pressing(&self) -> bool {
        self.pressing
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn head(&self) -> Option<&QueuedNote> {
        self.queue.front()
    }

    /// Appends a freshly spawned note. Notes must arrive in onset order.
    pub fn enqueue(&mut self, handle: NoteHandle, note: &NoteState) {
        debug_assert_eq!(note.lane(), self.lane);
        debug_assert!(self.queue.back().map_or(true, |last| last.onset <= note.onset));
        self.queue.push_back(QueuedNote {
            handle,
            onset: note.onset,
            duration: note.duration(),
        });
    }

    pub fn press(&mut self, now: f64, rules: &JudgeRules, out: &mut Vec<LaneEvent>) {
        self.pressing = true;
        if self.hold.is_some() {
            return;
        }
        let Some(head) = self.queue.front().copied() else {
            return;
        };

        let dt = now - head.onset;
        let Some(tier) = classify_tap(dt, &rules.windows) else {
            tracing::trace!(lane = self.lane, dt, "premature press ignored");
            return;
        };

        match head.kind() {
            NoteKind::Tap => {
                self.queue.pop_front();
                let already_missed = self.penalized == Some(head.handle);
                self.penalized = None;
                if !(tier == Tier::Miss && already_missed) {
                    out.push(self.judged(head, tier, dt));
                }
                out.push(LaneEvent::Despawn(head.handle));
            }
            NoteKind::Hold if dt > rules.windows.miss_forgive => {
                self.penalize(head, dt, out);
            }
            NoteKind::Hold => {
                self.hold = Some(ActiveHold {
                    note: head,
                    end: head.onset + head.duration,
                    held: 0.0,
                    last_sample: now,
                });
            }
        }
    }

    pub fn release(&mut self, now: f64, rules: &JudgeRules, out: &mut Vec<LaneEvent>) {
        if self.hold.is_some() {
            self.accumulate(now);
            self.pressing = false;
            self.finish_hold(rules, out);
        } else {
            self.pressing = false;
        }
    }

    /// Autonomous per-tick advance. Safe to call repeatedly at the same time.
    pub fn update(&mut self, now: f64, rules: &JudgeRules, out: &mut Vec<LaneEvent>) {
        if let Some(hold) = self.hold {
            self.accumulate(now);
            if now >= hold.end {
                self.finish_hold(rules, out);
            }
            return;
        }

        let Some(head) = self.queue.front().copied() else {
            return;
        };
        if rules.field.has_escaped(head.onset, now) {
            out.push(LaneEvent::GameOver {
                lane: self.lane,
                note: head.handle,
            });
            return;
        }
        let dt = now - head.onset;
        if dt > rules.windows.miss_forgive {
            self.penalize(head, dt, out);
        }
    }

    /// Releases every queued note. Used on game-over and explicit stops.
    pub fn drain(&mut self, out: &mut Vec<LaneEvent>) {
        self.hold = None;
        self.pressing = false;
        self.penalized = None;
        out.extend(self.queue.drain(..).map(|note| LaneEvent::Despawn(note.handle)));
    }

    fn accumulate(&mut self, now: f64) {
        let pressing = self.pressing;
        if let Some(hold) = self.hold.as_mut() {
            if pressing {
                hold.held += (now.min(hold.end) - hold.last_sample).max(0.0);
            }
            hold.last_sample = hold.last_sample.max(now.min(hold.end));
        }
    }

    fn finish_hold(&mut self, rules: &JudgeRules, out: &mut Vec<LaneEvent>) {
        let Some(hold) = self.hold.take() else {
            return;
        };
        let fraction = hold_fraction(hold.held, hold.note.duration);
        let tier = classify_hold(fraction, &rules.hold);

        if self.queue.front().map(|head| head.handle) == Some(hold.note.handle) {
            self.queue.pop_front();
        }
        if self.penalized == Some(hold.note.handle) {
            self.penalized = None;
        }
        tracing::trace!(lane = self.lane, held = hold.held, fraction, ?tier, "hold finished");
        out.push(self.judged(hold.note, tier, fraction));
        out.push(LaneEvent::Despawn(hold.note.handle));
    }

    fn penalize(&mut self, head: QueuedNote, dt: f64, out: &mut Vec<LaneEvent>) {
        if self.penalized == Some(head.handle) {
            return;
        }
        self.penalized = Some(head.handle);
        out.push(self.judged(head, Tier::Miss, dt));
    }

    fn judged(&self, note: QueuedNote, tier: Tier, measure: f64) -> LaneEvent {
        LaneEvent::Judged(Judgement {
            lane: self.lane,
            note: note.handle,
            kind: note.kind(),
            tier,
            measure,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{NoteArena, NoteDescriptor};

    fn rules() -> JudgeRules {
        JudgeRules::from_config(&GameConfig::default())
    }

    fn lane_with(notes: &[NoteDescriptor]) -> (LaneJudge, Vec<NoteHandle>) {
        let mut arena = NoteArena::new();
        let mut lane = LaneJudge::new(0);
        let handles = notes
            .iter()
            .map(|descriptor| {
                let state = NoteState::new(*descriptor, descriptor.time);
                let handle = arena.insert(state);
                lane.enqueue(handle, &state);
                handle
            })
            .collect();
        (lane, handles)
    }

    fn judgements(events: &[LaneEvent]) -> Vec<Tier> {
        events
            .iter()
            .filter_map(|event| match event {
                LaneEvent::Judged(judgement) => Some(judgement.tier),
                _ => None,
            })
            .collect()
    }

    fn despawns(events: &[LaneEvent]) -> Vec<NoteHandle> {
        events
            .iter()
            .filter_map(|event| match event {
                LaneEvent::Despawn(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn tap_inside_excellent_window(dt in -0.040f64..=0.040) {
            prop_assert_eq!(classify_tap(dt, &JudgeWindows::default()), Some(Tier::Excellent));
        }

        #[test]
        fn tap_inside_great_band(off in 0.0401f64..=0.090, early in any::<bool>()) {
            let dt = if early { -off } else { off };
            prop_assert_eq!(classify_tap(dt, &JudgeWindows::default()), Some(Tier::Great));
        }

        #[test]
        fn tap_inside_good_band(off in 0.0901f64..=0.140, early in any::<bool>()) {
            let dt = if early { -off } else { off };
            prop_assert_eq!(classify_tap(dt, &JudgeWindows::default()), Some(Tier::Good));
        }

        #[test]
        fn tap_later_than_forgiveness_misses(dt in 0.1801f64..10.0) {
            prop_assert_eq!(classify_tap(dt, &JudgeWindows::default()), Some(Tier::Miss));
        }

        #[test]
        fn tap_earlier_than_good_window_is_ignored(dt in -10.0f64..-0.1401) {
            prop_assert_eq!(classify_tap(dt, &JudgeWindows::default()), None);
        }

        #[test]
        fn hold_fraction_stays_in_unit_range(held in -5.0f64..50.0, duration in 0.0f64..20.0) {
            let fraction = hold_fraction(held, duration);
            prop_assert!((0.0..=1.0).contains(&fraction));
        }

        #[test]
        fn hold_tiers_follow_descending_thresholds(fraction in 0.0f64..=1.0) {
            let thresholds = HoldThresholds::default();
            let expected = if fraction >= 0.98 {
                Tier::Excellent
            } else if fraction >= 0.70 {
                Tier::Great
            } else if fraction >= 0.40 {
                Tier::Good
            } else {
                Tier::Miss
            };
            prop_assert_eq!(classify_hold(fraction, &thresholds), expected);
        }
    }

    #[test]
    fn premature_press_leaves_note_queued() {
        let (mut lane, _) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let mut out = Vec::new();

        lane.press(0.8, &rules(), &mut out);

        assert!(out.is_empty());
        assert_eq!(lane.pending(), 1);
    }

    #[test]
    fn tap_hit_dequeues_and_despawns() {
        let (mut lane, handles) =
            lane_with(&[NoteDescriptor::tap(0, 1.0), NoteDescriptor::tap(0, 2.0)]);
        let mut out = Vec::new();

        lane.press(1.02, &rules(), &mut out);

        assert_eq!(judgements(&out), vec![Tier::Excellent]);
        assert_eq!(despawns(&out), vec![handles[0]]);
        assert_eq!(lane.head().map(|n| n.handle), Some(handles[1]));
    }

    #[test]
    fn late_miss_is_counted_once_and_note_stays() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let mut out = Vec::new();

        lane.update(1.2, &rules(), &mut out);
        lane.update(1.2, &rules(), &mut out);
        lane.update(1.3, &rules(), &mut out);

        assert_eq!(judgements(&out), vec![Tier::Miss]);
        assert!(despawns(&out).is_empty());
        assert_eq!(lane.head().map(|n| n.handle), Some(handles[0]));
    }

    #[test]
    fn pressing_an_already_missed_tap_clears_it_without_second_miss() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let mut out = Vec::new();
        lane.update(1.25, &rules(), &mut out);
        out.clear();

        lane.press(1.3, &rules(), &mut out);

        assert!(judgements(&out).is_empty());
        assert_eq!(despawns(&out), vec![handles[0]]);
        assert_eq!(lane.pending(), 0);
    }

    #[test]
    fn tap_pressed_between_good_and_forgiveness_is_consumed_as_miss() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let mut out = Vec::new();

        lane.press(1.16, &rules(), &mut out);

        assert_eq!(judgements(&out), vec![Tier::Miss]);
        assert_eq!(despawns(&out), vec![handles[0]]);
        assert_eq!(lane.pending(), 0);
    }

    #[test]
    fn unpenalized_tap_pressed_after_forgiveness_misses_and_dequeues() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let mut out = Vec::new();

        lane.press(1.25, &rules(), &mut out);

        assert_eq!(judgements(&out), vec![Tier::Miss]);
        assert_eq!(despawns(&out), vec![handles[0]]);
        assert_eq!(lane.pending(), 0);
    }

    #[test]
    fn press_while_holding_is_ignored() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::hold(0, 1.0, 1.0)]);
        let rules = rules();
        let mut out = Vec::new();

        lane.press(1.0, &rules, &mut out);
        lane.press(1.1, &rules, &mut out);

        assert!(out.is_empty());
        assert_eq!(lane.state(), LaneState::Holding);
        assert_eq!(lane.head().map(|n| n.handle), Some(handles[0]));
    }

    #[test]
    fn head_escaping_the_field_reports_game_over() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let rules = rules();
        let escape = 1.0 + (rules.field.hit_y - rules.field.game_over_y) / rules.field.speed + 0.01;
        let mut out = Vec::new();

        lane.update(escape, &rules, &mut out);

        assert_eq!(
            out,
            vec![LaneEvent::GameOver {
                lane: 0,
                note: handles[0]
            }]
        );
    }

    #[test]
    fn hold_scored_on_release() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::hold(0, 2.0, 1.0)]);
        let rules = rules();
        let mut out = Vec::new();

        lane.press(2.01, &rules, &mut out);
        assert_eq!(lane.state(), LaneState::Holding);
        for step in 1..=9 {
            lane.update(2.01 + step as f64 * 0.1, &rules, &mut out);
        }
        lane.release(2.95, &rules, &mut out);

        assert_eq!(judgements(&out), vec![Tier::Great]);
        assert_eq!(despawns(&out), vec![handles[0]]);
        assert_eq!(lane.state(), LaneState::Idle);
        match out[0] {
            LaneEvent::Judged(judgement) => {
                assert_eq!(judgement.kind, NoteKind::Hold);
                assert!((judgement.measure - 0.94).abs() < 1e-9);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn hold_completes_without_release() {
        let (mut lane, _) = lane_with(&[NoteDescriptor::hold(0, 2.0, 0.5)]);
        let rules = rules();
        let mut out = Vec::new();

        lane.press(2.0, &rules, &mut out);
        lane.update(2.3, &rules, &mut out);
        assert!(out.is_empty());
        lane.update(2.6, &rules, &mut out);

        assert_eq!(judgements(&out), vec![Tier::Excellent]);
        assert_eq!(lane.pending(), 0);
        assert_eq!(lane.state(), LaneState::Idle);
    }

    #[test]
    fn released_early_hold_misses() {
        let (mut lane, _) = lane_with(&[NoteDescriptor::hold(0, 2.0, 2.0)]);
        let rules = rules();
        let mut out = Vec::new();

        lane.press(2.0, &rules, &mut out);
        lane.update(2.5, &rules, &mut out);
        lane.release(2.6, &rules, &mut out);

        assert_eq!(judgements(&out), vec![Tier::Miss]);
        assert_eq!(lane.pending(), 0);
    }

    #[test]
    fn late_hold_press_misses_once_without_starting() {
        let (mut lane, handles) = lane_with(&[NoteDescriptor::hold(0, 2.0, 1.0)]);
        let rules = rules();
        let mut out = Vec::new();

        lane.press(2.3, &rules, &mut out);
        lane.update(2.31, &rules, &mut out);
        lane.press(2.32, &rules, &mut out);

        assert_eq!(judgements(&out), vec![Tier::Miss]);
        assert_eq!(lane.state(), LaneState::Idle);
        assert_eq!(lane.head().map(|n| n.handle), Some(handles[0]));
    }

    #[test]
    fn release_while_idle_is_a_no_op() {
        let (mut lane, _) = lane_with(&[NoteDescriptor::tap(0, 1.0)]);
        let mut out = Vec::new();

        lane.release(1.0, &rules(), &mut out);

        assert!(out.is_empty());
        assert!(!lane.is_pressing());
        assert_eq!(lane.pending(), 1);
    }

    #[test]
    fn drain_despawns_everything_once() {
        let (mut lane, handles) =
            lane_with(&[NoteDescriptor::hold(0, 1.0, 1.0), NoteDescriptor::tap(0, 3.0)]);
        let mut out = Vec::new();
        lane.press(1.0, &rules(), &mut out);

        lane.drain(&mut out);
        lane.drain(&mut out);

        assert_eq!(despawns(&out), handles);
        assert_eq!(lane.state(), LaneState::Idle);
    }
}
