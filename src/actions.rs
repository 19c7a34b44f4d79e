use anyhow::{Result, anyhow};
use log::{info, warn};

/// Virtual mouse/keyboard that bound gestures are replayed into.
pub struct UinputSink {
    enabled: bool,
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                enabled: true,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self {
                enabled: true,
                linux: None,
            })
        }
    }

    pub fn noop() -> Self {
        Self {
            enabled: true,
            linux: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.linux.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    pub fn scroll(&mut self, axis: ScrollAxis, steps: i32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            match axis {
                ScrollAxis::Vertical => dev.scroll_vertical(steps)?,
                ScrollAxis::Horizontal => dev.scroll_horizontal(steps)?,
            }
        }
        #[cfg(not(target_os = "linux"))]
        let _ = (axis, steps);
        Ok(())
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        self.click(MouseButton::parse(which)?)
    }

    pub fn click(&mut self, button: MouseButton) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.click(button)?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = button;
        Ok(())
    }

    /// Send a chord like "CTRL+TAB" or a single "PAGEDOWN".
    pub fn key_chord(&mut self, chord: &str) -> Result<()> {
        let tokens = chord_tokens(chord)?;
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            let mut keys = Vec::with_capacity(tokens.len());
            for t in &tokens {
                keys.push(map_key(t)?);
            }
            // press in order
            for k in &keys {
                dev.key_send(*k, 1)?;
            }
            dev.sync()?;
            // release in reverse
            for k in keys.iter().rev() {
                dev.key_send(*k, 0)?;
            }
            dev.sync()?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = tokens;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

impl ScrollAxis {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" | "v" => Ok(Self::Vertical),
            "horizontal" | "h" => Ok(Self::Horizontal),
            other => Err(anyhow!("unknown scroll axis: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "middle" => Ok(Self::Middle),
            other => Err(anyhow!("unknown mouse button: {other}")),
        }
    }

    #[cfg(target_os = "linux")]
    fn as_uinput(self) -> uinput::event::controller::Mouse {
        use uinput::event::controller::Mouse;
        match self {
            Self::Left => Mouse::Left,
            Self::Right => Mouse::Right,
            Self::Middle => Mouse::Middle,
        }
    }
}

pub const KEY_TOKENS: &[&str] = &[
    "CTRL", "CONTROL", "ALT", "SHIFT", "SUPER", "META", "WIN", "TAB", "MINUS", "-", "EQUAL", "=",
    "LEFT", "RIGHT", "UP", "DOWN", "PAGEUP", "PAGEDOWN", "HOME", "END", "SPACE", "ENTER", "ESC",
];

fn chord_tokens(chord: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = chord
        .split('+')
        .map(|s| s.trim().to_ascii_uppercase())
        .collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(anyhow!("malformed key chord: '{chord}'"));
    }
    if let Some(bad) = parts.iter().find(|p| !KEY_TOKENS.contains(&p.as_str())) {
        return Err(anyhow!("unsupported key token: {bad}"));
    }
    Ok(parts)
}

#[cfg(target_os = "linux")]
fn map_key(tok: &str) -> Result<uinput::event::keyboard::Key> {
    use uinput::event::keyboard::Key as K;
    let k = match tok {
        "CTRL" | "CONTROL" => K::LeftControl,
        "ALT" => K::LeftAlt,
        "SHIFT" => K::LeftShift,
        "SUPER" | "META" | "WIN" => K::LeftMeta,
        "TAB" => K::Tab,
        "MINUS" | "-" => K::Minus,
        "EQUAL" | "=" => K::Equal,
        "LEFT" => K::Left,
        "RIGHT" => K::Right,
        "UP" => K::Up,
        "DOWN" => K::Down,
        "PAGEUP" => K::PageUp,
        "PAGEDOWN" => K::PageDown,
        "HOME" => K::Home,
        "END" => K::End,
        "SPACE" => K::Space,
        "ENTER" => K::Enter,
        "ESC" => K::Esc,
        other => return Err(anyhow!("unsupported key token: {other}")),
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(not(target_os = "linux"))]
struct LinuxUinput;

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, keyboard::Key, relative};

        let mut builder = uinput::default()?
            .name("Gesturectl Virtual Input")?
            // relative axes + wheel
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            // mouse buttons
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?;
        // every key map_key can produce
        for k in [
            Key::LeftControl,
            Key::LeftAlt,
            Key::LeftShift,
            Key::LeftMeta,
            Key::Tab,
            Key::Minus,
            Key::Equal,
            Key::Left,
            Key::Right,
            Key::Up,
            Key::Down,
            Key::PageUp,
            Key::PageDown,
            Key::Home,
            Key::End,
            Key::Space,
            Key::Enter,
            Key::Esc,
        ] {
            builder = builder.event(k)?;
        }
        let dev = builder.create()?;

        info!("uinput: created virtual device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.dev.send(button.as_uinput(), 1)?;
        self.sync()?;
        self.dev.send(button.as_uinput(), 0)?;
        self.sync()
    }

    fn scroll_vertical(&mut self, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        self.dev.send(Wheel::Vertical, steps)?;
        self.sync()
    }

    fn scroll_horizontal(&mut self, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        self.dev.send(Wheel::Horizontal, steps)?;
        self.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chord_tokens_normalise_case_and_spaces() {
        assert_eq!(chord_tokens("ctrl + tab").unwrap(), vec!["CTRL", "TAB"]);
        assert_eq!(chord_tokens("PageDown").unwrap(), vec!["PAGEDOWN"]);
    }

    #[test]
    fn chord_tokens_reject_unknown_and_empty() {
        assert!(chord_tokens("CTRL+F13").is_err());
        assert!(chord_tokens("CTRL+").is_err());
        assert!(chord_tokens("").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn every_token_maps_to_a_key() {
        for t in KEY_TOKENS {
            assert!(map_key(t).is_ok(), "{t}");
        }
    }

    #[test]
    fn noop_sink_accepts_valid_actions() {
        let mut sink = UinputSink::noop();
        assert!(!sink.is_live());
        sink.click_mouse("left").unwrap();
        sink.scroll(ScrollAxis::Horizontal, -2).unwrap();
        sink.key_chord("ALT+TAB").unwrap();
        assert!(sink.click_mouse("fourth").is_err());
    }

    #[test]
    fn disabled_sink_still_validates() {
        let mut sink = UinputSink::noop();
        sink.set_enabled(false);
        assert!(!sink.is_enabled());
        assert!(sink.key_chord("NOPE").is_err());
        sink.key_chord("ESC").unwrap();
    }

    #[test]
    fn parse_axis_and_button() {
        assert_eq!(ScrollAxis::parse("Vertical").unwrap(), ScrollAxis::Vertical);
        assert_eq!(ScrollAxis::parse("h").unwrap(), ScrollAxis::Horizontal);
        assert!(ScrollAxis::parse("diagonal").is_err());
        assert_eq!(MouseButton::parse("MIDDLE").unwrap(), MouseButton::Middle);
    }
}
