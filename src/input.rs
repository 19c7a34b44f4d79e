//! Per-frame position samples from the tracking collaborator (JSON lines).

use log::{error, warn};
use serde::Deserialize;
use std::{
    io::BufRead,
    sync::mpsc::{self, Receiver},
    thread,
};
use thiserror::Error;

use crate::history::Point;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Sample(Option<Point>),
    End,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireSample {
    Pair(i32, i32),
    Point(Point),
}

/// Parse one input line.
///
/// `Ok(None)` means the line is not a frame (blank or `#` comment);
/// `Ok(Some(None))` is a frame with no detection.
pub fn parse_line(line_no: usize, raw: &str) -> Result<Option<Option<Point>>, SampleError> {
    let s = raw.trim();
    if s.is_empty() || s.starts_with('#') {
        return Ok(None);
    }
    let v: Option<WireSample> =
        serde_json::from_str(s).map_err(|source| SampleError::Json { line: line_no, source })?;
    Ok(Some(v.map(|w| match w {
        WireSample::Pair(x, y) => Point::new(x, y),
        WireSample::Point(p) => p,
    })))
}

/// Read frames on a background thread; the channel ends with `Tick::End`.
pub fn spawn_reader<R>(reader: R) -> Receiver<Tick>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (idx, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    error!("input read failed: {e}");
                    break;
                }
            };
            let tick = match parse_line(idx + 1, &line) {
                Ok(Some(sample)) => Tick::Sample(sample),
                Ok(None) => continue,
                Err(e) => {
                    // still a frame: the cooldown must keep decaying
                    warn!("bad sample, treating as no detection: {e}");
                    Tick::Sample(None)
                }
            };
            if tx.send(tick).is_err() {
                return;
            }
        }
        let _ = tx.send(Tick::End);
    });
    rx
}
