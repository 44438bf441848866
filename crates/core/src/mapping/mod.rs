use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one physical input source (a finger, a key, a pad button).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputSource(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    Press,
    Release,
}

/// Where a press landed: either an already resolved lane or a horizontal
/// coordinate on the input surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputTarget {
    Lane(usize),
    Surface(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub source: InputSource,
    pub kind: InputKind,
    pub target: InputTarget,
}

impl InputEvent {
    pub fn press_lane(source: u64, lane: usize) -> Self {
        Self {
            source: InputSource(source),
            kind: InputKind::Press,
            target: InputTarget::Lane(lane),
        }
    }

    pub fn press_at(source: u64, x: f64) -> Self {
        Self {
            source: InputSource(source),
            kind: InputKind::Press,
            target: InputTarget::Surface(x),
        }
    }

    /// Releases carry no position; they always resolve to the lane the
    /// same source pressed.
    pub fn release(source: u64) -> Self {
        Self {
            source: InputSource(source),
            kind: InputKind::Release,
            target: InputTarget::Lane(0),
        }
    }
}

/// An input event attributed to exactly one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutedInput {
    pub source: InputSource,
    pub lane: usize,
    pub kind: InputKind,
}

/// Maps raw input to lanes and remembers which lane each source pressed.
#[derive(Debug, Clone)]
pub struct InputRouter {
    lane_count: usize,
    input_width: f64,
    held: HashMap<InputSource, usize>,
}

impl InputRouter {
    pub fn new(lane_count: usize, input_width: f64) -> Self {
        Self {
            lane_count: lane_count.max(1),
            input_width,
            held: HashMap::new(),
        }
    }

    /// Equal-width bin containing `x`, clamped to the valid lane range.
    pub fn lane_at(&self, x: f64) -> usize {
        let bins = self.lane_count as f64;
        let bin = (x / self.input_width * bins).floor();
        if bin.is_nan() || bin < 0.0 {
            0
        } else {
            (bin as usize).min(self.lane_count - 1)
        }
    }

    /// Resolves `event` to a lane. Returns `None` for duplicate presses from a
    /// source that is already down and for releases from unknown sources.
    pub fn route(&mut self, event: &InputEvent) -> Option<RoutedInput> {
        match event.kind {
            InputKind::Press => {
                if self.held.contains_key(&event.source) {
                    return None;
                }
                let lane = match event.target {
                    InputTarget::Lane(lane) => lane.min(self.lane_count - 1),
                    InputTarget::Surface(x) => self.lane_at(x),
                };
                self.held.insert(event.source, lane);
                Some(RoutedInput {
                    source: event.source,
                    lane,
                    kind: InputKind::Press,
                })
            }
            InputKind::Release => {
                let lane = self.held.remove(&event.source)?;
                Some(RoutedInput {
                    source: event.source,
                    lane,
                    kind: InputKind::Release,
                })
            }
        }
    }

    pub fn sources_down(&self) -> usize {
        self.held.len()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_surface_into_equal_bins() {
        let router = InputRouter::new(4, 800.0);

        assert_eq!(router.lane_at(0.0), 0);
        assert_eq!(router.lane_at(199.9), 0);
        assert_eq!(router.lane_at(200.0), 1);
        assert_eq!(router.lane_at(799.0), 3);
    }

    #[test]
    fn clamps_coordinates_outside_the_surface() {
        let router = InputRouter::new(4, 800.0);

        assert_eq!(router.lane_at(-12.0), 0);
        assert_eq!(router.lane_at(800.0), 3);
        assert_eq!(router.lane_at(5000.0), 3);
        assert_eq!(router.lane_at(f64::NAN), 0);
    }

    #[test]
    fn release_follows_the_source_not_the_position() {
        let mut router = InputRouter::new(2, 1.0);

        let a = router.route(&InputEvent::press_at(7, 0.1)).unwrap();
        let b = router.route(&InputEvent::press_at(9, 0.9)).unwrap();
        assert_eq!((a.lane, b.lane), (0, 1));

        assert_eq!(router.route(&InputEvent::release(9)).map(|r| r.lane), Some(1));
        assert_eq!(router.route(&InputEvent::release(7)).map(|r| r.lane), Some(0));
        assert_eq!(router.sources_down(), 0);
    }

    #[test]
    fn duplicate_presses_and_orphan_releases_are_dropped() {
        let mut router = InputRouter::new(3, 1.0);

        assert!(router.route(&InputEvent::press_lane(1, 2)).is_some());
        assert!(router.route(&InputEvent::press_lane(1, 0)).is_none());
        assert!(router.route(&InputEvent::release(2)).is_none());
        assert!(router.route(&InputEvent::release(1)).is_some());
        assert!(router.route(&InputEvent::release(1)).is_none());
    }
}
