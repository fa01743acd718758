//! Removal of terminal control sequences from captured pane text

use std::borrow::Cow;

#[derive(Clone, Copy, PartialEq)]
enum ParseState {
    Normal,
    Escape,
    Csi,
    Osc,
    OscEscape,     // ESC seen inside OSC, expecting '\' (ST)
    CharsetSelect, // ESC ( X, ESC ) X - consume next char
}

/// Strip every escape sequence so offsets refer to visible text only.
///
/// Returns the input unchanged (borrowed) when it holds no escapes, which
/// makes stripping already-stripped text a no-op.
pub fn strip(text: &str) -> Cow<'_, str> {
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut state = ParseState::Normal;

    for ch in text.chars() {
        state = match state {
            ParseState::Normal => {
                if ch == '\x1b' {
                    ParseState::Escape
                } else {
                    out.push(ch);
                    ParseState::Normal
                }
            }
            ParseState::Escape => match ch {
                '[' => ParseState::Csi,
                ']' => ParseState::Osc,
                '(' | ')' => ParseState::CharsetSelect,
                '\x1b' => ParseState::Escape,
                // Two-byte escapes (ESC 7, ESC M, ...) end here
                _ => ParseState::Normal,
            },
            // Parameters and intermediates are 0x20..=0x3F, final byte 0x40..=0x7E
            ParseState::Csi => match ch {
                '\x20'..='\x3f' => ParseState::Csi,
                '\x1b' => ParseState::Escape,
                _ => ParseState::Normal,
            },
            ParseState::Osc => match ch {
                '\x07' => ParseState::Normal,
                '\x1b' => ParseState::OscEscape,
                _ => ParseState::Osc,
            },
            ParseState::OscEscape => match ch {
                '\\' => ParseState::Normal,
                '\x1b' => ParseState::OscEscape,
                _ => ParseState::Osc,
            },
            ParseState::CharsetSelect => ParseState::Normal,
        };
    }

    Cow::Owned(out)
}
