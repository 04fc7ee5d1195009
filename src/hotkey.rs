//! Global hotkeys via `rdev`.
//! The listener thread only translates key presses into [`OverlayEvent`]s and posts them to the
//! UI channel; all state changes happen on the UI thread.

use rdev::{EventType, Key, listen};
use std::collections::HashSet;
use std::thread;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use crate::config::HotkeySettings;
use crate::overlay::OverlayEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hotkey {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Hotkey {
    fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
            alt: false,
        }
    }

    fn alt(key: Key) -> Self {
        Self {
            alt: true,
            ..Self::plain(key)
        }
    }
}

/// Parse a hotkey string like "Ctrl+Shift+Space" or "Alt+Z" into a [`Hotkey`].
pub fn parse_hotkey(s: &str) -> Option<Hotkey> {
    let mut ctrl = false;
    let mut shift = false;
    let mut alt = false;
    let mut key: Option<Key> = None;

    for part in s.split('+') {
        let upper = part.trim().to_ascii_uppercase();
        match upper.as_str() {
            "CTRL" | "CONTROL" => ctrl = true,
            "SHIFT" => shift = true,
            "ALT" => alt = true,
            "" => {}
            _ => {
                if key.is_some() {
                    return None;
                }
                key = Some(parse_key(&upper)?);
            }
        }
    }

    key.map(|key| Hotkey { key, ctrl, shift, alt })
}

fn parse_key(upper: &str) -> Option<Key> {
    match upper {
        "SPACE" => Some(Key::Space),
        "TAB" => Some(Key::Tab),
        "ENTER" | "RETURN" => Some(Key::Return),
        "ESC" | "ESCAPE" => Some(Key::Escape),
        "DELETE" => Some(Key::Delete),
        "BACKSPACE" => Some(Key::Backspace),
        "HOME" => Some(Key::Home),
        "END" => Some(Key::End),
        "PAGEUP" => Some(Key::PageUp),
        "PAGEDOWN" => Some(Key::PageDown),
        _ if upper.len() > 1 && upper.starts_with('F') => match upper[1..].parse::<u8>().ok()? {
            1 => Some(Key::F1),
            2 => Some(Key::F2),
            3 => Some(Key::F3),
            4 => Some(Key::F4),
            5 => Some(Key::F5),
            6 => Some(Key::F6),
            7 => Some(Key::F7),
            8 => Some(Key::F8),
            9 => Some(Key::F9),
            10 => Some(Key::F10),
            11 => Some(Key::F11),
            12 => Some(Key::F12),
            _ => None,
        },
        _ if upper.len() == 1 => upper.chars().next().and_then(char_key),
        _ => None,
    }
}

fn char_key(c: char) -> Option<Key> {
    Some(match c {
        '0' => Key::Num0,
        '1' => Key::Num1,
        '2' => Key::Num2,
        '3' => Key::Num3,
        '4' => Key::Num4,
        '5' => Key::Num5,
        '6' => Key::Num6,
        '7' => Key::Num7,
        '8' => Key::Num8,
        '9' => Key::Num9,
        'A' => Key::KeyA,
        'B' => Key::KeyB,
        'C' => Key::KeyC,
        'D' => Key::KeyD,
        'E' => Key::KeyE,
        'F' => Key::KeyF,
        'G' => Key::KeyG,
        'H' => Key::KeyH,
        'I' => Key::KeyI,
        'J' => Key::KeyJ,
        'K' => Key::KeyK,
        'L' => Key::KeyL,
        'M' => Key::KeyM,
        'N' => Key::KeyN,
        'O' => Key::KeyO,
        'P' => Key::KeyP,
        'Q' => Key::KeyQ,
        'R' => Key::KeyR,
        'S' => Key::KeyS,
        'T' => Key::KeyT,
        'U' => Key::KeyU,
        'V' => Key::KeyV,
        'W' => Key::KeyW,
        'X' => Key::KeyX,
        'Y' => Key::KeyY,
        'Z' => Key::KeyZ,
        _ => return None,
    })
}

/// Hotkey -> event table, in the order they are checked.
#[derive(Debug, Clone)]
pub struct HotkeyBindings {
    bindings: Vec<(Hotkey, OverlayEvent)>,
}

impl HotkeyBindings {
    pub fn from_settings(settings: &HotkeySettings) -> Self {
        let table = [
            (&settings.arm, Hotkey::plain(Key::F2), OverlayEvent::ToggleArm),
            (&settings.scan, Hotkey::alt(Key::KeyZ), OverlayEvent::Scan),
            (&settings.clear, Hotkey::alt(Key::KeyX), OverlayEvent::Clear),
            (&settings.recall, Hotkey::alt(Key::KeyS), OverlayEvent::Recall),
            (&settings.reset, Hotkey::alt(Key::KeyR), OverlayEvent::Reset),
            (&settings.visibility, Hotkey::alt(Key::KeyV), OverlayEvent::ToggleVisibility),
            (&settings.quit, Hotkey::plain(Key::F4), OverlayEvent::Quit),
        ];

        let bindings = table
            .into_iter()
            .map(|(spec, fallback, event)| {
                let hotkey = parse_hotkey(spec).unwrap_or_else(|| {
                    warn!("Invalid hotkey '{}' for {:?}; using {:?}", spec, event, fallback);
                    fallback
                });
                (hotkey, event)
            })
            .collect();

        Self { bindings }
    }

    fn lookup(&self, pressed: Hotkey) -> Option<OverlayEvent> {
        self.bindings
            .iter()
            .find(|(hotkey, _)| *hotkey == pressed)
            .map(|(_, event)| event.clone())
    }
}

/// Modifier and auto-repeat tracking for the raw key stream.
#[derive(Debug, Default)]
struct KeyTracker {
    ctrl: bool,
    shift: bool,
    alt: bool,
    held: HashSet<Key>,
}

impl KeyTracker {
    fn on_event(&mut self, event: &EventType, bindings: &HotkeyBindings) -> Option<OverlayEvent> {
        match *event {
            EventType::KeyPress(key) => {
                if self.set_modifier(key, true) {
                    return None;
                }
                // auto-repeat
                if !self.held.insert(key) {
                    return None;
                }
                bindings.lookup(Hotkey {
                    key,
                    ctrl: self.ctrl,
                    shift: self.shift,
                    alt: self.alt,
                })
            }
            EventType::KeyRelease(key) => {
                if !self.set_modifier(key, false) {
                    self.held.remove(&key);
                }
                None
            }
            _ => None,
        }
    }

    /// Updates modifier state; returns whether `key` is a modifier.
    fn set_modifier(&mut self, key: Key, down: bool) -> bool {
        match key {
            Key::ControlLeft | Key::ControlRight => self.ctrl = down,
            Key::ShiftLeft | Key::ShiftRight => self.shift = down,
            Key::Alt | Key::AltGr => self.alt = down,
            _ => return false,
        }
        true
    }
}

/// Starts the global key listener on its own thread.
/// Matching events are posted to `sender` and the UI is woken with a repaint request.
pub fn spawn_listener(bindings: HotkeyBindings, sender: Sender<OverlayEvent>, ctx: egui::Context) {
    debug!("Starting hotkey listener with {} bindings", bindings.bindings.len());
    let spawned = thread::Builder::new()
        .name("hotkeys".to_string())
        .spawn(move || {
            let mut tracker = KeyTracker::default();
            let result = listen(move |event| {
                let Some(overlay_event) = tracker.on_event(&event.event_type, &bindings) else {
                    return;
                };
                debug!("Hotkey -> {:?}", overlay_event);
                match sender.try_send(overlay_event) {
                    Ok(()) => ctx.request_repaint(),
                    Err(TrySendError::Full(dropped)) => warn!("UI queue full, dropping {:?}", dropped),
                    Err(TrySendError::Closed(_)) => debug!("UI queue closed"),
                }
            });
            if let Err(e) = result {
                error!("Global hotkey listener stopped: {:?}", e);
            }
        });

    if let Err(e) = spawned {
        error!("Failed to start hotkey thread: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_bindings() -> HotkeyBindings {
        HotkeyBindings::from_settings(&HotkeySettings::default())
    }

    fn press(tracker: &mut KeyTracker, bindings: &HotkeyBindings, key: Key) -> Option<OverlayEvent> {
        tracker.on_event(&EventType::KeyPress(key), bindings)
    }

    fn release(tracker: &mut KeyTracker, bindings: &HotkeyBindings, key: Key) {
        assert!(tracker.on_event(&EventType::KeyRelease(key), bindings).is_none());
    }

    #[test]
    fn test_parse_hotkey() {
        assert_eq!(parse_hotkey("Alt+Z"), Some(Hotkey::alt(Key::KeyZ)));
        assert_eq!(parse_hotkey("f2"), Some(Hotkey::plain(Key::F2)));
        assert_eq!(
            parse_hotkey("Ctrl + Shift + Space"),
            Some(Hotkey {
                key: Key::Space,
                ctrl: true,
                shift: true,
                alt: false
            })
        );
        assert_eq!(parse_hotkey("Alt+7"), Some(Hotkey::alt(Key::Num7)));
    }

    #[test]
    fn test_parse_hotkey_rejects_garbage() {
        assert_eq!(parse_hotkey("Alt"), None);
        assert_eq!(parse_hotkey("F13"), None);
        assert_eq!(parse_hotkey("Alt+Banana"), None);
        assert_eq!(parse_hotkey("A+B"), None);
    }

    #[test]
    fn test_invalid_setting_falls_back_to_default() {
        let settings = HotkeySettings {
            scan: "Hyper+?".to_string(),
            ..HotkeySettings::default()
        };
        let bindings = HotkeyBindings::from_settings(&settings);
        assert!(matches!(
            bindings.lookup(Hotkey::alt(Key::KeyZ)),
            Some(OverlayEvent::Scan)
        ));
    }

    #[test]
    fn test_alt_combo_fires_once_per_press() {
        let bindings = default_bindings();
        let mut tracker = KeyTracker::default();

        assert!(press(&mut tracker, &bindings, Key::Alt).is_none());
        assert!(matches!(press(&mut tracker, &bindings, Key::KeyZ), Some(OverlayEvent::Scan)));
        // auto-repeat
        assert!(press(&mut tracker, &bindings, Key::KeyZ).is_none());
        release(&mut tracker, &bindings, Key::KeyZ);
        assert!(matches!(press(&mut tracker, &bindings, Key::KeyZ), Some(OverlayEvent::Scan)));
    }

    #[test]
    fn test_repeat_of_earlier_key_is_ignored_while_another_is_held() {
        let bindings = default_bindings();
        let mut tracker = KeyTracker::default();

        press(&mut tracker, &bindings, Key::Alt);
        assert!(matches!(press(&mut tracker, &bindings, Key::KeyZ), Some(OverlayEvent::Scan)));
        assert!(matches!(press(&mut tracker, &bindings, Key::KeyX), Some(OverlayEvent::Clear)));
        assert!(press(&mut tracker, &bindings, Key::KeyZ).is_none());
        assert!(press(&mut tracker, &bindings, Key::KeyX).is_none());

        release(&mut tracker, &bindings, Key::KeyZ);
        assert!(press(&mut tracker, &bindings, Key::KeyX).is_none(), "X is still held");
        assert!(matches!(press(&mut tracker, &bindings, Key::KeyZ), Some(OverlayEvent::Scan)));
    }

    #[test]
    fn test_modifiers_must_match_exactly() {
        let bindings = default_bindings();
        let mut tracker = KeyTracker::default();

        assert!(press(&mut tracker, &bindings, Key::KeyZ).is_none(), "plain Z is not bound");
        release(&mut tracker, &bindings, Key::KeyZ);

        press(&mut tracker, &bindings, Key::Alt);
        assert!(press(&mut tracker, &bindings, Key::F2).is_none(), "Alt+F2 is not F2");
        release(&mut tracker, &bindings, Key::F2);
        release(&mut tracker, &bindings, Key::Alt);

        assert!(matches!(press(&mut tracker, &bindings, Key::F2), Some(OverlayEvent::ToggleArm)));
        release(&mut tracker, &bindings, Key::F2);
        assert!(matches!(press(&mut tracker, &bindings, Key::F4), Some(OverlayEvent::Quit)));
    }
}
