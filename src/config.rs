use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Deserializer};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::gestures::{
    DEFAULT_PULL_THRESHOLD, DEFAULT_PUSH_THRESHOLD, DEFAULT_SWIPE_THRESHOLD, Gesture, MIN_SAMPLES,
    RecognizerConfig, SwipeFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub swipe: f64,
    pub push: f64,
    pub pull: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            swipe: DEFAULT_SWIPE_THRESHOLD,
            push: DEFAULT_PUSH_THRESHOLD,
            pull: DEFAULT_PULL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Swipe,
    Push,
    Pull,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Detectors {
    /// Evaluation order per frame; the first detector to fire wins.
    pub order: Vec<DetectorKind>,
    pub swipe_direction: SwipeFilter,
}

impl Default for Detectors {
    fn default() -> Self {
        Self {
            order: vec![DetectorKind::Push, DetectorKind::Pull, DetectorKind::Swipe],
            swipe_direction: SwipeFilter::Any,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub detectors: Detectors,

    // nested or dotted tables are flattened into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("recognizer.history_size must be at least {min}, got {size}")]
    HistoryTooSmall { size: usize, min: usize },
    #[error("thresholds.{name} must be a positive number, got {value}")]
    BadThreshold { name: &'static str, value: f64 },
    #[error("detectors.order must list at least one detector")]
    NoDetectors,
    #[error("detectors.order lists {0:?} more than once")]
    DuplicateDetector(DetectorKind),
    #[error("unknown binding '{0}' (expected one of: {keys})", keys = Gesture::BINDING_KEYS.join(", "))]
    UnknownBinding(String),
    #[error("binding '{0}' has empty action")]
    EmptyAction(String),
    #[error("binding '{key}' has invalid action '{action}'")]
    InvalidAction { key: String, action: String },
    #[error("binding '{0}' uses cmd: but allow_commands=false")]
    CommandsNotAllowed(String),
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }
}

fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_profile(p: &Profile) -> std::result::Result<(), ProfileError> {
    if p.recognizer.history_size < MIN_SAMPLES {
        return Err(ProfileError::HistoryTooSmall {
            size: p.recognizer.history_size,
            min: MIN_SAMPLES,
        });
    }

    let th = &p.thresholds;
    for (name, value) in [("swipe", th.swipe), ("push", th.push), ("pull", th.pull)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ProfileError::BadThreshold { name, value });
        }
    }

    if p.detectors.order.is_empty() {
        return Err(ProfileError::NoDetectors);
    }
    let mut seen = HashSet::new();
    for d in &p.detectors.order {
        if !seen.insert(*d) {
            return Err(ProfileError::DuplicateDetector(*d));
        }
    }

    for (k, v) in &p.bindings {
        if !Gesture::BINDING_KEYS.contains(&k.as_str()) {
            return Err(ProfileError::UnknownBinding(k.clone()));
        }
        if v.trim().is_empty() {
            return Err(ProfileError::EmptyAction(k.clone()));
        }

        let ok = v.starts_with("mouse:")
            || v.starts_with("scroll:")
            || v.starts_with("key:")
            || v.starts_with("cmd:")
            || v == "none";
        if !ok {
            return Err(ProfileError::InvalidAction {
                key: k.clone(),
                action: v.clone(),
            });
        }
        if v.starts_with("cmd:") && !p.meta.allow_commands {
            return Err(ProfileError::CommandsNotAllowed(k.clone()));
        }
    }
    Ok(())
}

pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Profile::parse(&txt).with_context(|| format!("failed to load {}", path.display()))
}

pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

/// Profiles directory plus the `active` pointer file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn default_config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("gesturectl"))
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open_at(default_config_dir()?)
    }

    pub fn open_at(config_dir: PathBuf) -> Result<Self> {
        let profiles_dir = config_dir.join("profiles");
        fs::create_dir_all(&profiles_dir)
            .with_context(|| format!("failed to create {}", profiles_dir.display()))?;

        let def_path = profiles_dir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = config_dir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile_file(&profiles_dir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            config_dir,
            profiles_dir,
            active_ptr,
        })
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    pub fn active_path(&self) -> PathBuf {
        self.profile_path(&self.active_name)
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile_file(&self.active_path())?;
        Ok(())
    }

    /// Switch the active pointer; the profile must exist and validate first.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile_file(&p)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": self.list_profiles(),
            "recognizer": {
                "history_size": self.profile.recognizer.history_size,
                "cooldown_frames": self.profile.recognizer.cooldown_frames,
            },
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "dry_run": "gesturectl run --dry-run prints gestures without a virtual device"
            }
        })
    }
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}
