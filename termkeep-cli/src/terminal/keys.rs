//! Translate crossterm key events into the bytes a shell expects

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press means for an attached pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Forward this input to the pane
    Send(String),
    /// Leave the pane running and return to the caller (Ctrl+])
    Detach,
    Ignore,
}

/// Encode a key event for the PTY.
pub fn encode_key(event: KeyEvent) -> KeyInput {
    if event.kind == KeyEventKind::Release {
        return KeyInput::Ignore;
    }

    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let alt = event.modifiers.contains(KeyModifiers::ALT);

    if ctrl && let KeyCode::Char(c) = event.code {
        let c = c.to_ascii_lowercase();
        if c == ']' {
            return KeyInput::Detach;
        }
        if c.is_ascii_lowercase() {
            // Ctrl+A = 0x01 .. Ctrl+Z = 0x1a
            return send_byte(c as u8 - b'a' + 1);
        }
        return match c {
            '[' => send_byte(0x1b),
            '\\' => send_byte(0x1c),
            '^' => send_byte(0x1e),
            '_' => send_byte(0x1f),
            '@' | ' ' => send_byte(0x00),
            _ => KeyInput::Ignore,
        };
    }

    let encoded = match event.code {
        KeyCode::Char(c) if alt => format!("\x1b{c}"),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "\r".to_string(),
        KeyCode::Tab => "\t".to_string(),
        KeyCode::BackTab => "\x1b[Z".to_string(),
        KeyCode::Backspace => "\x7f".to_string(),
        KeyCode::Esc => "\x1b".to_string(),
        KeyCode::Up => "\x1b[A".to_string(),
        KeyCode::Down => "\x1b[B".to_string(),
        KeyCode::Right => "\x1b[C".to_string(),
        KeyCode::Left => "\x1b[D".to_string(),
        KeyCode::Home => "\x1b[H".to_string(),
        KeyCode::End => "\x1b[F".to_string(),
        KeyCode::Insert => "\x1b[2~".to_string(),
        KeyCode::Delete => "\x1b[3~".to_string(),
        KeyCode::PageUp => "\x1b[5~".to_string(),
        KeyCode::PageDown => "\x1b[6~".to_string(),
        KeyCode::F(n @ 1..=4) => format!("\x1bO{}", (b'P' + n - 1) as char),
        KeyCode::F(n @ 5..=12) => {
            let code = match n {
                5 => 15,
                6..=10 => n + 11,
                _ => n + 12,
            };
            format!("\x1b[{code}~")
        }
        _ => return KeyInput::Ignore,
    };
    KeyInput::Send(encoded)
}

fn send_byte(byte: u8) -> KeyInput {
    KeyInput::Send(char::from(byte).to_string())
}
