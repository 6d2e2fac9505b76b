//! Live board plumbing: push subscription and operator commands.

pub mod listener;

pub use listener::{LiveListener, Subscription};

use crate::notice::Notice;
use crate::store::PushMessage;

/// Operator command typed into a running board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardCommand {
    Advance { order_id: i64, line_id: i64 },
    Reset { order_id: i64 },
    Clear { order_id: i64 },
    Focus { product_id: i64 },
    SwitchDisplay { display_id: i64 },
    ToggleMute,
    Refresh,
    Quit,
}

impl BoardCommand {
    /// Parse one input line. Blank input is `Ok(None)`.
    pub fn parse(input: &str) -> Result<Option<Self>, String> {
        let mut parts = input.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = parts.collect();

        let command = match (verb, args.as_slice()) {
            ("a" | "advance", [order, line]) => BoardCommand::Advance {
                order_id: parse_id(order, "order")?,
                line_id: parse_id(line, "line")?,
            },
            ("r" | "reset", [order]) => BoardCommand::Reset { order_id: parse_id(order, "order")? },
            ("c" | "clear", [order]) => BoardCommand::Clear { order_id: parse_id(order, "order")? },
            ("f" | "focus", [product]) => BoardCommand::Focus { product_id: parse_id(product, "product")? },
            ("d" | "display", [display]) => BoardCommand::SwitchDisplay {
                display_id: parse_id(display, "display")?,
            },
            ("m" | "mute", []) => BoardCommand::ToggleMute,
            ("g" | "refresh", []) => BoardCommand::Refresh,
            ("q" | "quit", []) => BoardCommand::Quit,
            _ => return Err(format!("Unknown command: '{}'", input.trim())),
        };
        Ok(Some(command))
    }
}

fn parse_id(value: &str, what: &str) -> Result<i64, String> {
    value
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| format!("Invalid {} id: '{}'", what, value))
}

/// Session mute on top of the display's sound setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoundMute(bool);

impl SoundMute {
    pub fn is_muted(&self) -> bool {
        self.0
    }

    /// Flip the mute; returns the new state
    pub fn toggle(&mut self) -> bool {
        self.0 = !self.0;
        self.0
    }

    pub fn allows(&self, sound_enabled: bool) -> bool {
        sound_enabled && !self.0
    }
}

/// What the board does for one push message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAlert {
    pub notice: Notice,
    pub ring_bell: bool,
}

impl PushAlert {
    pub fn for_message(message: &PushMessage, sound_enabled: bool) -> Self {
        Self {
            notice: Notice::new_order(message.order_name()),
            ring_bell: sound_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{NoticeKind, NoticeLevel};
    use serde_json::json;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            BoardCommand::parse("a 12 40").unwrap(),
            Some(BoardCommand::Advance { order_id: 12, line_id: 40 })
        );
        assert_eq!(BoardCommand::parse("  reset 3 ").unwrap(), Some(BoardCommand::Reset { order_id: 3 }));
        assert_eq!(BoardCommand::parse("c 3").unwrap(), Some(BoardCommand::Clear { order_id: 3 }));
        assert_eq!(BoardCommand::parse("f 8").unwrap(), Some(BoardCommand::Focus { product_id: 8 }));
        assert_eq!(BoardCommand::parse("d 2").unwrap(), Some(BoardCommand::SwitchDisplay { display_id: 2 }));
        assert_eq!(BoardCommand::parse("m").unwrap(), Some(BoardCommand::ToggleMute));
        assert_eq!(BoardCommand::parse("q").unwrap(), Some(BoardCommand::Quit));
        assert_eq!(BoardCommand::parse("").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(BoardCommand::parse("a 12").is_err());
        assert!(BoardCommand::parse("a x 1").is_err());
        assert!(BoardCommand::parse("r 0").is_err());
        assert!(BoardCommand::parse("explode").is_err());
    }

    #[test]
    fn test_push_alert() {
        let message = PushMessage {
            id: 3,
            channel: "kitchen_new_order".to_string(),
            payload: json!({"order_id": 9, "name": "Order 0009"}),
        };
        let alert = PushAlert::for_message(&message, true);
        assert!(alert.ring_bell);
        assert_eq!(alert.notice.kind, NoticeKind::NewOrder);
        assert_eq!(alert.notice.level, NoticeLevel::Success);
        assert_eq!(alert.notice.message, "New Order: Order 0009");

        let quiet = PushAlert::for_message(&message, false);
        assert!(!quiet.ring_bell);
    }

    #[test]
    fn test_mute_overrides_display_sound() {
        let mut mute = SoundMute::default();
        assert!(mute.allows(true));
        assert!(!mute.allows(false));

        assert!(mute.toggle());
        assert!(!mute.allows(true));
        assert!(!mute.toggle());
        assert!(mute.allows(true));
    }
}
