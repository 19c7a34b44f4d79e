use log::debug;
use serde::Deserialize;

use crate::history::{Point, PositionHistory};

/// Detectors stay silent until the window holds this many samples.
pub const MIN_SAMPLES: usize = 5;

pub const DEFAULT_HISTORY_SIZE: usize = 10;
pub const DEFAULT_COOLDOWN_FRAMES: u32 = 15;
pub const DEFAULT_SWIPE_THRESHOLD: f64 = 100.0;
pub const DEFAULT_PUSH_THRESHOLD: f64 = 150.0;
pub const DEFAULT_PULL_THRESHOLD: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Swipe(SwipeDirection),
    Push,
    Pull,
}

impl Gesture {
    /// Key used in profile `[bindings]`.
    pub fn binding_key(&self) -> &'static str {
        match self {
            Gesture::Swipe(SwipeDirection::Left) => "swipe.left",
            Gesture::Swipe(SwipeDirection::Right) => "swipe.right",
            Gesture::Swipe(SwipeDirection::Up) => "swipe.up",
            Gesture::Swipe(SwipeDirection::Down) => "swipe.down",
            Gesture::Push => "push",
            Gesture::Pull => "pull",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gesture::Swipe(SwipeDirection::Left) => "swipe_left",
            Gesture::Swipe(SwipeDirection::Right) => "swipe_right",
            Gesture::Swipe(SwipeDirection::Up) => "swipe_up",
            Gesture::Swipe(SwipeDirection::Down) => "swipe_down",
            Gesture::Push => "push",
            Gesture::Pull => "pull",
        }
    }

    pub const BINDING_KEYS: [&'static str; 6] = [
        "swipe.left",
        "swipe.right",
        "swipe.up",
        "swipe.down",
        "push",
        "pull",
    ];
}

/// Which swipe directions `detect_swipe` is allowed to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeFilter {
    #[default]
    Any,
    Left,
    Right,
    Up,
    Down,
}

impl SwipeFilter {
    pub fn accepts(self, dir: SwipeDirection) -> bool {
        matches!(
            (self, dir),
            (SwipeFilter::Any, _)
                | (SwipeFilter::Left, SwipeDirection::Left)
                | (SwipeFilter::Right, SwipeDirection::Right)
                | (SwipeFilter::Up, SwipeDirection::Up)
                | (SwipeFilter::Down, SwipeDirection::Down)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub history_size: usize,
    pub cooldown_frames: u32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            cooldown_frames: DEFAULT_COOLDOWN_FRAMES,
        }
    }
}

/// Classifies a stream of per-frame positions into swipe / push / pull.
///
/// Call [`update`](Self::update) exactly once per frame, including frames
/// with no detection, so the cooldown keeps decaying. Detectors read the
/// oldest and newest samples of the shared window and only fire while the
/// cooldown is zero; a successful detection re-arms it.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    history: PositionHistory,
    last_gesture: Option<Gesture>,
    gesture_cooldown: u32,
    cooldown_frames: u32,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::with_config(RecognizerConfig::default())
    }
}

impl GestureRecognizer {
    pub fn new(history_size: usize) -> Self {
        Self::with_config(RecognizerConfig {
            history_size,
            ..RecognizerConfig::default()
        })
    }

    pub fn with_config(cfg: RecognizerConfig) -> Self {
        Self {
            history: PositionHistory::new(cfg.history_size),
            last_gesture: None,
            gesture_cooldown: 0,
            cooldown_frames: cfg.cooldown_frames,
        }
    }

    pub fn config(&self) -> RecognizerConfig {
        RecognizerConfig {
            history_size: self.history.capacity(),
            cooldown_frames: self.cooldown_frames,
        }
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }

    pub fn cooldown(&self) -> u32 {
        self.gesture_cooldown
    }

    pub fn cooldown_frames(&self) -> u32 {
        self.cooldown_frames
    }

    pub fn last_gesture(&self) -> Option<Gesture> {
        self.last_gesture
    }

    pub fn update(&mut self, position: Option<Point>) {
        if let Some(p) = position {
            self.history.push(p);
        }
        self.gesture_cooldown = self.gesture_cooldown.saturating_sub(1);
    }

    pub fn detect_swipe(&mut self, filter: SwipeFilter, threshold: f64) -> Option<SwipeDirection> {
        let (dx, dy) = self.displacement()?;

        let distance = (dx as f64).hypot(dy as f64);
        if distance < threshold {
            return None;
        }

        // |dx| == |dy| falls through to the vertical branch.
        let dir = if dx.abs() > dy.abs() {
            if dx > 0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            }
        } else if dy > 0 {
            SwipeDirection::Down
        } else {
            SwipeDirection::Up
        };

        if filter.accepts(dir) && self.try_fire(Gesture::Swipe(dir)) {
            return Some(dir);
        }
        None
    }

    pub fn detect_push(&mut self, threshold: f64) -> bool {
        match self.displacement() {
            Some((_, dy)) if dy as f64 > threshold => self.try_fire(Gesture::Push),
            _ => false,
        }
    }

    /// Pull reads the same vertical displacement as push, with the sign flipped.
    pub fn detect_pull(&mut self, threshold: f64) -> bool {
        match self.displacement() {
            Some((_, dy)) if (dy as f64) < -threshold => self.try_fire(Gesture::Pull),
            _ => false,
        }
    }

    /// Newest minus oldest, once the window holds `MIN_SAMPLES`.
    fn displacement(&self) -> Option<(i64, i64)> {
        if self.history.len() < MIN_SAMPLES {
            return None;
        }
        let start = self.history.oldest()?;
        let end = self.history.newest()?;
        Some((
            i64::from(end.x) - i64::from(start.x),
            i64::from(end.y) - i64::from(start.y),
        ))
    }

    fn try_fire(&mut self, g: Gesture) -> bool {
        if self.gesture_cooldown != 0 {
            return false;
        }
        self.gesture_cooldown = self.cooldown_frames;
        self.last_gesture = Some(g);
        debug!("recognized {} (cooldown {})", g.label(), self.cooldown_frames);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(r: &mut GestureRecognizer, pts: &[(i32, i32)]) {
        for &p in pts {
            r.update(Some(p.into()));
        }
    }

    fn with_endpoints(start: (i32, i32), end: (i32, i32)) -> GestureRecognizer {
        let mut r = GestureRecognizer::default();
        feed(&mut r, &[start, start, start, start, end]);
        r
    }

    #[test]
    fn short_history_never_fires() {
        for n in 0..MIN_SAMPLES {
            let mut r = GestureRecognizer::default();
            for i in 0..n {
                r.update(Some(Point::new(i as i32 * 1000, i as i32 * 1000)));
            }
            assert_eq!(r.detect_swipe(SwipeFilter::Any, 1.0), None);
            assert!(!r.detect_push(1.0));
            assert!(!r.detect_pull(1.0));
            assert_eq!(r.cooldown(), 0);
        }
    }

    #[test]
    fn empty_update_keeps_history_and_decays_cooldown() {
        let mut r = with_endpoints((0, 0), (200, 0));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), Some(SwipeDirection::Right));
        let before: Vec<Point> = r.history().iter().copied().collect();

        let mut last = r.cooldown();
        for _ in 0..40 {
            r.update(None);
            assert!(r.cooldown() <= last);
            last = r.cooldown();
        }
        assert_eq!(r.cooldown(), 0);
        let after: Vec<Point> = r.history().iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn swipe_right_then_cooldown_blocks_repeat() {
        let mut r = with_endpoints((0, 0), (200, 0));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), Some(SwipeDirection::Right));
        assert_eq!(r.cooldown(), DEFAULT_COOLDOWN_FRAMES);
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), None);
        assert_eq!(r.last_gesture(), Some(Gesture::Swipe(SwipeDirection::Right)));
    }

    #[test]
    fn cooldown_releases_after_exactly_cooldown_frames_ticks() {
        let mut r = with_endpoints((0, 0), (200, 0));
        assert!(r.detect_swipe(SwipeFilter::Any, 100.0).is_some());

        for _ in 0..DEFAULT_COOLDOWN_FRAMES - 1 {
            r.update(None);
            assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), None);
            assert!(!r.detect_push(1.0));
            assert!(!r.detect_pull(1.0));
        }
        r.update(None);
        assert_eq!(r.cooldown(), 0);
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), Some(SwipeDirection::Right));
    }

    #[test]
    fn tie_resolves_to_vertical() {
        let mut r = with_endpoints((0, 0), (50, 50));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 10.0), Some(SwipeDirection::Down));

        let mut r = with_endpoints((0, 0), (-50, -50));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 10.0), Some(SwipeDirection::Up));
    }

    #[test]
    fn each_direction_classified() {
        let cases = [
            ((300, 0), SwipeDirection::Right),
            ((-300, 0), SwipeDirection::Left),
            ((0, 300), SwipeDirection::Down),
            ((0, -300), SwipeDirection::Up),
            ((300, 299), SwipeDirection::Right),
            ((299, -300), SwipeDirection::Up),
        ];
        for (end, want) in cases {
            let mut r = with_endpoints((0, 0), end);
            assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), Some(want), "end={end:?}");
        }
    }

    #[test]
    fn distance_equal_to_threshold_fires() {
        let mut r = with_endpoints((0, 0), (60, 80));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), Some(SwipeDirection::Down));

        let mut r = with_endpoints((0, 0), (60, 79));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), None);
    }

    #[test]
    fn filter_mismatch_is_silent_and_keeps_cooldown() {
        let mut r = with_endpoints((0, 0), (200, 0));
        assert_eq!(r.detect_swipe(SwipeFilter::Left, 100.0), None);
        assert_eq!(r.detect_swipe(SwipeFilter::Up, 100.0), None);
        assert_eq!(r.cooldown(), 0);
        assert_eq!(r.last_gesture(), None);
        assert_eq!(r.detect_swipe(SwipeFilter::Right, 100.0), Some(SwipeDirection::Right));
    }

    #[test]
    fn push_down_not_pull() {
        let mut r = with_endpoints((0, 0), (0, 200));
        assert!(!r.detect_pull(150.0));
        assert!(r.detect_push(150.0));
        assert_eq!(r.cooldown(), DEFAULT_COOLDOWN_FRAMES);
        assert_eq!(r.last_gesture(), Some(Gesture::Push));
    }

    #[test]
    fn pull_on_upward_motion() {
        let mut r = with_endpoints((0, 0), (0, -200));
        assert!(!r.detect_push(150.0));
        assert!(r.detect_pull(150.0));
        assert_eq!(r.last_gesture(), Some(Gesture::Pull));
    }

    #[test]
    fn pull_ignores_horizontal_motion() {
        let mut r = with_endpoints((0, 0), (-400, 0));
        assert!(!r.detect_pull(150.0));
        assert!(!r.detect_push(150.0));
    }

    #[test]
    fn push_threshold_is_strict() {
        let mut r = with_endpoints((0, 0), (0, 150));
        assert!(!r.detect_push(150.0));
        let mut r = with_endpoints((0, 0), (0, -150));
        assert!(!r.detect_pull(150.0));
    }

    #[test]
    fn repeated_negative_queries_are_stable() {
        let mut r = with_endpoints((0, 0), (30, 20));
        for _ in 0..5 {
            assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), None);
            assert!(!r.detect_push(150.0));
            assert!(!r.detect_pull(150.0));
        }
        assert_eq!(r.cooldown(), 0);
        assert_eq!(r.history().len(), 5);
    }

    #[test]
    fn window_slides_past_old_start() {
        let mut r = GestureRecognizer::new(5);
        feed(&mut r, &[(-500, 0), (0, 0), (0, 0), (0, 0), (0, 0)]);
        feed(&mut r, &[(0, 0)]);
        // (-500, 0) has been evicted; net motion is zero
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 100.0), None);
    }

    #[test]
    fn success_does_not_clear_history() {
        let mut r = with_endpoints((0, 0), (0, 200));
        assert!(r.detect_push(150.0));
        assert_eq!(r.history().len(), 5);
    }

    #[test]
    fn custom_cooldown_length() {
        let mut r = GestureRecognizer::with_config(RecognizerConfig {
            history_size: 6,
            cooldown_frames: 2,
        });
        feed(&mut r, &[(0, 0), (0, 0), (0, 0), (0, 0), (0, 300)]);
        assert!(r.detect_push(150.0));
        r.update(None);
        assert!(!r.detect_push(150.0));
        r.update(None);
        assert!(r.detect_push(150.0));
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let mut r = with_endpoints((i32::MIN, i32::MIN), (i32::MAX, i32::MAX));
        assert_eq!(r.detect_swipe(SwipeFilter::Any, 1.0), Some(SwipeDirection::Down));
    }
}
