//! Fixed-column transcript lines.
//!
//! ```text
//! [alice]  hello there                      [09.30 17:33]
//! |<-------------- message column ------->| |<- time ->|
//! ```
//!
//! Widths are display columns: East-Asian wide characters count as two.

use unicode_width::UnicodeWidthChar;

/// Minimum width of the timestamp column, brackets included.
pub const MIN_TIME_WIDTH: usize = 12;
/// Columns left unused at the right edge of the terminal.
pub const SAFETY_MARGIN: usize = 1;
/// Blank columns between the message and timestamp columns.
pub const COLUMN_GAP: usize = 1;

pub fn char_width(c: char) -> usize {
    c.width().unwrap_or(1)
}

pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Longest prefix of `s` that fits in `max` columns.
pub fn clip_width(s: &str, max: usize) -> &str {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = char_width(c);
        if used + w > max {
            return &s[..idx];
        }
        used += w;
    }
    s
}

fn push_padded(line: &mut String, s: &str, width: usize) {
    let clipped = clip_width(s, width);
    line.push_str(clipped);
    let pad = width.saturating_sub(display_width(clipped));
    line.extend(std::iter::repeat(' ').take(pad));
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Render one entry into at most `columns - 1` display columns.
pub fn format_line(author: &str, text: &str, timestamp: &str, columns: usize) -> String {
    let cols = columns.saturating_sub(SAFETY_MARGIN);
    let stamp = format!("[{}]", sanitize(timestamp));
    let stamp_width = display_width(&stamp);
    let time_width = stamp_width.max(MIN_TIME_WIDTH);
    let message_width = cols.saturating_sub(time_width + COLUMN_GAP);

    let message = format!("[{}]  {}", sanitize(author), sanitize(text));
    let mut line = String::with_capacity(cols);
    push_padded(&mut line, &message, message_width);
    line.extend(std::iter::repeat(' ').take(COLUMN_GAP));
    line.extend(std::iter::repeat(' ').take(time_width - stamp_width));
    line.push_str(&stamp);

    if display_width(&line) > cols {
        line.truncate(clip_width(&line, cols).len());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_at_typical_width() {
        let line = format_line("alice", "hello", "09.30 17:33", 40);
        assert_eq!(display_width(&line), 39);
        assert!(line.starts_with("[alice]  hello "));
        assert!(line.ends_with(" [09.30 17:33]"));
    }

    #[test]
    fn test_never_exceeds_columns_minus_margin() {
        let long = "x".repeat(500);
        let wide = "漢字".repeat(200);
        for columns in 0..120 {
            for text in ["", "short", long.as_str(), wide.as_str()] {
                let line = format_line("bob", text, "01.02 03:04", columns);
                assert!(
                    display_width(&line) <= columns.saturating_sub(1),
                    "columns={columns} width={}",
                    display_width(&line)
                );
            }
        }
    }

    #[test]
    fn test_timestamp_column_is_fixed() {
        let columns = 60;
        let offsets: Vec<usize> = ["", "a", "a much longer message that will be clipped at the edge", "全角テキスト"]
            .iter()
            .map(|text| {
                let line = format_line("u", text, "12.31 23:59", columns);
                let start = line.rfind('[').unwrap();
                columns - display_width(&line[..start])
            })
            .collect();
        assert!(offsets.windows(2).all(|w| w[0] == w[1]), "{offsets:?}");
    }

    #[test]
    fn test_wide_characters_count_double() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("漢字"), 4);
        assert_eq!(clip_width("漢字", 3), "漢");
        assert_eq!(clip_width("a漢", 2), "a");
        assert_eq!(clip_width("abc", 10), "abc");
    }

    #[test]
    fn test_clipped_wide_text_is_padded_to_column() {
        let a = format_line("u", &"漢".repeat(50), "01.01 00:00", 41);
        let b = format_line("u", "plain", "01.01 00:00", 41);
        assert_eq!(display_width(&a), display_width(&b));
    }

    #[test]
    fn test_control_characters_are_blanked() {
        let line = format_line("eve", "a\tb\x1b[2J", "01.01 00:00", 60);
        assert!(!line.chars().any(char::is_control));
    }

    #[test]
    fn test_long_timestamp_widens_time_column() {
        let line = format_line("u", "hi", "2024-01-01 00:00:00", 60);
        assert!(line.ends_with(" [2024-01-01 00:00:00]"));
        assert_eq!(display_width(&line), 59);
    }
}
