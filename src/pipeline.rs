use anyhow::{Context, Result};
use log::{error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    time::Duration,
};

use crate::actions::UinputSink;
use crate::config::{self, DetectorKind, Detectors, Profile, ProfileStore, Thresholds};
use crate::dispatch::dispatch_gesture;
use crate::gestures::{Gesture, GestureRecognizer};
use crate::history::Point;
use crate::input::{self, Tick};

/// One recognizer plus the detector settings it is driven with.
#[derive(Debug)]
pub struct Session {
    recognizer: GestureRecognizer,
    thresholds: Thresholds,
    detectors: Detectors,
}

impl Session {
    pub fn new(profile: &Profile) -> Self {
        Self {
            recognizer: GestureRecognizer::with_config(profile.recognizer),
            thresholds: profile.thresholds.clone(),
            detectors: profile.detectors.clone(),
        }
    }

    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    /// Feed one frame, then try each detector in profile order.
    pub fn tick(&mut self, sample: Option<Point>) -> Option<Gesture> {
        self.recognizer.update(sample);

        let th = &self.thresholds;
        for kind in &self.detectors.order {
            let hit = match kind {
                DetectorKind::Swipe => self
                    .recognizer
                    .detect_swipe(self.detectors.swipe_direction, th.swipe)
                    .map(Gesture::Swipe),
                DetectorKind::Push => self.recognizer.detect_push(th.push).then_some(Gesture::Push),
                DetectorKind::Pull => self.recognizer.detect_pull(th.pull).then_some(Gesture::Pull),
            };
            if hit.is_some() {
                return hit;
            }
        }
        None
    }

    /// Returns true when the recognizer had to be rebuilt (history dropped).
    pub fn apply_profile(&mut self, profile: &Profile) -> bool {
        self.thresholds = profile.thresholds.clone();
        self.detectors = profile.detectors.clone();
        if self.recognizer.config() == profile.recognizer {
            return false;
        }
        self.recognizer = GestureRecognizer::with_config(profile.recognizer);
        true
    }
}

#[derive(Debug, Clone)]
pub enum ProfileSource {
    Active,
    Named(String),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub profile: ProfileSource,
    pub input: Option<PathBuf>,
    pub dry_run: bool,
}

fn resolve_profile(src: &ProfileSource) -> Result<(Profile, PathBuf)> {
    match src {
        ProfileSource::Active => {
            let store = ProfileStore::load_or_install_default()?;
            let path = store.active_path();
            Ok((store.profile, path))
        }
        ProfileSource::Named(name) => {
            let store = ProfileStore::load_or_install_default()?;
            let path = store.profile_path(name);
            Ok((config::load_profile_file(&path)?, path))
        }
        ProfileSource::File(path) => Ok((config::load_profile_file(path)?, path.clone())),
    }
}

fn watch_profile(path: &Path) -> Option<(RecommendedWatcher, Receiver<notify::Result<notify::Event>>)> {
    let dir = path.parent()?;
    let (tx, rx) = mpsc::channel();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            warn!("profile watching unavailable: {e}");
            return None;
        }
    };
    // watch the directory; editors often replace the file instead of writing it
    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        warn!("cannot watch {}: {e}", dir.display());
        return None;
    }
    Some((watcher, rx))
}

fn profile_touched(rx: &Receiver<notify::Result<notify::Event>>, path: &Path) -> bool {
    let mut touched = false;
    while let Ok(res) = rx.try_recv() {
        match res {
            Ok(ev) => {
                if (ev.kind.is_modify() || ev.kind.is_create())
                    && ev.paths.iter().any(|p| p.file_name() == path.file_name())
                {
                    touched = true;
                }
            }
            Err(e) => warn!("profile watch error: {e}"),
        }
    }
    touched
}

fn emit(out: &mut impl Write, frame: u64, g: Gesture) -> io::Result<()> {
    writeln!(
        out,
        "{}",
        serde_json::json!({"frame": frame, "gesture": g.label()})
    )?;
    out.flush()
}

pub fn run(opts: RunOptions) -> Result<()> {
    let (mut profile, profile_path) = resolve_profile(&opts.profile)?;
    let profile_path = fs::canonicalize(&profile_path).unwrap_or(profile_path);
    info!(
        "profile '{}' from {}",
        profile.display_name(),
        profile_path.display()
    );

    let term = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&term))
            .context("failed to install signal handler")?;
    }

    let reader: Box<dyn BufRead + Send> = match &opts.input {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("failed to open {}", p.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let ticks = input::spawn_reader(reader);

    let watch = watch_profile(&profile_path);

    let mut sink = if opts.dry_run {
        None
    } else {
        Some(UinputSink::new().unwrap_or_else(|e| {
            warn!("uinput unavailable ({e}); gestures will only be printed");
            UinputSink::noop()
        }))
    };

    let mut session = Session::new(&profile);
    let mut out = io::stdout().lock();
    let mut frames: u64 = 0;
    let mut emitted: u64 = 0;

    while !term.load(Ordering::Relaxed) {
        if let Some((_, rx)) = &watch {
            if profile_touched(rx, &profile_path) {
                match config::load_profile_file(&profile_path) {
                    Ok(p) => {
                        let rebuilt = session.apply_profile(&p);
                        profile = p;
                        info!(
                            "profile reloaded{}",
                            if rebuilt { " (recognizer reset)" } else { "" }
                        );
                    }
                    Err(e) => warn!("reload failed, keeping last good profile: {e:#}"),
                }
            }
        }

        match ticks.recv_timeout(Duration::from_millis(100)) {
            Ok(Tick::Sample(sample)) => {
                frames += 1;
                let Some(g) = session.tick(sample) else {
                    continue;
                };
                emitted += 1;
                emit(&mut out, frames, g)?;
                if let Some(sink) = sink.as_mut() {
                    if let Err(e) = dispatch_gesture(g, &profile, sink) {
                        error!("dispatch failed: {e:#}");
                    }
                }
            }
            Ok(Tick::End) | Err(RecvTimeoutError::Disconnected) => {
                info!("input closed");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    if term.load(Ordering::Relaxed) {
        info!("interrupted");
    }
    info!("processed {frames} frames, {emitted} gestures");
    Ok(())
}
