use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    /// Just saw ESC.
    Start,
    Csi,
    Osc,
    OscEsc,
    /// DCS/SOS/PM/APC payload, ended by `ESC \`.
    String,
    StringEsc,
}

/// Drops terminal escape sequences from remote text, one char at a time.
#[derive(Debug, Default)]
struct EscapeFilter {
    state: Option<Escape>,
}

impl EscapeFilter {
    /// Returns the char when it belongs to visible text.
    fn feed(&mut self, c: char) -> Option<char> {
        let Some(state) = self.state else {
            if c == '\x1b' {
                self.state = Some(Escape::Start);
                return None;
            }
            return Some(c);
        };

        self.state = match (state, c) {
            (Escape::Start, '[') => Some(Escape::Csi),
            (Escape::Start, ']') => Some(Escape::Osc),
            (Escape::Start, 'P' | 'X' | '^' | '_') => Some(Escape::String),
            (Escape::Start, _) => None,
            (Escape::Csi, '@'..='~') => None,
            (Escape::Csi, _) => Some(Escape::Csi),
            (Escape::Osc, '\x07') => None,
            (Escape::Osc, '\x1b') => Some(Escape::OscEsc),
            (Escape::Osc, _) => Some(Escape::Osc),
            (Escape::OscEsc, '\\') => None,
            (Escape::OscEsc, '\x1b') => Some(Escape::OscEsc),
            (Escape::OscEsc, _) => Some(Escape::Osc),
            (Escape::String, '\x1b') => Some(Escape::StringEsc),
            (Escape::String, _) => Some(Escape::String),
            (Escape::StringEsc, '\\') => None,
            (Escape::StringEsc, '\x1b') => Some(Escape::StringEsc),
            (Escape::StringEsc, _) => Some(Escape::String),
        };
        None
    }
}

/// Text safe to place in a terminal cell grid: escape sequences, control and
/// bidi formatting characters removed, tabs turned into a single space.
pub fn display_text(input: &str) -> Cow<'_, str> {
    if !input.chars().any(needs_filtering) {
        return Cow::Borrowed(input);
    }

    let mut filter = EscapeFilter::default();
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let Some(c) = filter.feed(c) else {
            continue;
        };
        if c == '\t' {
            out.push(' ');
        } else if !needs_filtering(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Terminal column width of already-sanitized text.
pub fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

fn needs_filtering(c: char) -> bool {
    c.is_control() || is_format_control(c)
}

fn is_format_control(c: char) -> bool {
    c == '\u{061C}'
        || c == '\u{200E}'
        || c == '\u{200F}'
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(display_text("all good"), Cow::Borrowed("all good")));
    }

    #[test]
    fn strips_color_and_title_sequences() {
        let input = "ok \u{1b}[31mred\u{1b}[0m \u{1b}]0;title\u{7} done";
        assert_eq!(display_text(input), "ok red  done");
    }

    #[test]
    fn strips_string_terminated_payloads() {
        assert_eq!(display_text("a\u{1b}Ppayload\u{1b}\\b"), "ab");
    }

    #[test]
    fn tabs_become_spaces_and_bidi_is_removed() {
        assert_eq!(display_text("a\tb\r\u{202e}x"), "a bx");
    }

    #[test]
    fn width_counts_wide_chars() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本"), 4);
    }
}
