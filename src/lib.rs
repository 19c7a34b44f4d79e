//! Fingertip gesture recognition: swipe, push and pull from a per-frame
//! stream of 2D positions, plus the profile, input and action plumbing
//! used by the `gesturectl` binary.

pub mod actions;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod gestures;
pub mod history;
pub mod input;
pub mod logging;
pub mod pipeline;

pub use gestures::{Gesture, GestureRecognizer, RecognizerConfig, SwipeDirection, SwipeFilter};
pub use history::{Point, PositionHistory};
