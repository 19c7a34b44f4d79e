use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use std::process::{Command, Stdio};

use crate::actions::{MouseButton, ScrollAxis, UinputSink};
use crate::config::Profile;
use crate::gestures::Gesture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Mouse(MouseButton),
    Scroll(ScrollAxis, i32),
    Key(String),
    Cmd(String),
}

impl Action {
    /// `mouse:left`, `scroll:vertical@-3`, `key:CTRL+TAB`, `cmd:...`, `none`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "none" {
            return Ok(Action::None);
        }
        if let Some(rest) = s.strip_prefix("mouse:") {
            return Ok(Action::Mouse(MouseButton::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix("scroll:") {
            let (axis, steps) = rest.split_once('@').unwrap_or((rest, "+1"));
            let axis = if axis.trim().is_empty() {
                ScrollAxis::Vertical
            } else {
                ScrollAxis::parse(axis)?
            };
            let steps: i32 = steps
                .trim()
                .parse()
                .map_err(|_| anyhow!("bad scroll steps in '{s}'"))?;
            return Ok(Action::Scroll(axis, steps));
        }
        if let Some(rest) = s.strip_prefix("key:") {
            return Ok(Action::Key(rest.trim().to_string()));
        }
        if let Some(rest) = s.strip_prefix("cmd:") {
            let cmd = rest.trim();
            if cmd.is_empty() {
                return Err(anyhow!("empty command in '{s}'"));
            }
            return Ok(Action::Cmd(cmd.to_string()));
        }
        Err(anyhow!("unknown action '{s}'"))
    }
}

/// Run whatever `profile` binds to `g`. Unbound gestures are a no-op.
pub fn dispatch_gesture(g: Gesture, profile: &Profile, sink: &mut UinputSink) -> Result<Action> {
    let key = g.binding_key();
    let Some(raw) = profile.bindings.get(key) else {
        debug!("no binding for {key}");
        return Ok(Action::None);
    };
    let action = Action::parse(raw).with_context(|| format!("binding '{key}'"))?;

    match &action {
        Action::None => {}
        Action::Mouse(b) => sink.click(*b)?,
        Action::Scroll(axis, steps) => sink.scroll(*axis, *steps)?,
        Action::Key(chord) => sink.key_chord(chord)?,
        Action::Cmd(cmd) => {
            if !profile.meta.allow_commands {
                return Err(anyhow!("binding '{key}' uses cmd: but allow_commands=false"));
            }
            let child = Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .spawn()
                .with_context(|| format!("failed to spawn '{cmd}'"))?;
            info!("{key}: spawned '{cmd}' (pid={})", child.id());
        }
    }
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestures::SwipeDirection;

    fn profile(extra: &str) -> Profile {
        Profile::parse(&format!("[meta]\nname = \"t\"\n{extra}")).unwrap()
    }

    #[test]
    fn parses_every_action_kind() {
        assert_eq!(Action::parse("none").unwrap(), Action::None);
        assert_eq!(
            Action::parse("mouse:right").unwrap(),
            Action::Mouse(MouseButton::Right)
        );
        assert_eq!(
            Action::parse("scroll:vertical@-3").unwrap(),
            Action::Scroll(ScrollAxis::Vertical, -3)
        );
        assert_eq!(
            Action::parse("scroll:horizontal@+2").unwrap(),
            Action::Scroll(ScrollAxis::Horizontal, 2)
        );
        assert_eq!(
            Action::parse("scroll:").unwrap(),
            Action::Scroll(ScrollAxis::Vertical, 1)
        );
        assert_eq!(
            Action::parse("key: CTRL+TAB ").unwrap(),
            Action::Key("CTRL+TAB".into())
        );
        assert_eq!(
            Action::parse("cmd:notify-send hi").unwrap(),
            Action::Cmd("notify-send hi".into())
        );
    }

    #[test]
    fn rejects_malformed_actions() {
        assert!(Action::parse("scroll:vertical@lots").is_err());
        assert!(Action::parse("scroll:sideways@1").is_err());
        assert!(Action::parse("mouse:thumb").is_err());
        assert!(Action::parse("cmd:  ").is_err());
        assert!(Action::parse("jump").is_err());
    }

    #[test]
    fn unbound_gesture_is_noop() {
        let p = profile("");
        let mut sink = UinputSink::noop();
        assert_eq!(dispatch_gesture(Gesture::Push, &p, &mut sink).unwrap(), Action::None);
    }

    #[test]
    fn dispatches_bound_swipe() {
        let p = profile("[bindings]\nswipe.left = \"key:LEFT\"\npull = \"scroll:vertical@+3\"\n");
        let mut sink = UinputSink::noop();
        assert_eq!(
            dispatch_gesture(Gesture::Swipe(SwipeDirection::Left), &p, &mut sink).unwrap(),
            Action::Key("LEFT".into())
        );
        assert_eq!(
            dispatch_gesture(Gesture::Pull, &p, &mut sink).unwrap(),
            Action::Scroll(ScrollAxis::Vertical, 3)
        );
    }

    #[test]
    fn cmd_blocked_when_commands_disallowed() {
        // a profile edited in memory after validation must still be gated
        let mut p = profile("");
        p.bindings.insert("push".into(), "cmd:true".into());
        let mut sink = UinputSink::noop();
        assert!(dispatch_gesture(Gesture::Push, &p, &mut sink).is_err());
    }

    #[test]
    fn bad_key_surfaces_as_error() {
        let p = profile("[bindings]\npush = \"key:HYPER\"\n");
        let mut sink = UinputSink::noop();
        assert!(dispatch_gesture(Gesture::Push, &p, &mut sink).is_err());
    }
}
