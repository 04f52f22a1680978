use crate::history::format::display_width;
use crate::history::{ChatEntry, ChatHistory};
use crate::notify::Notifier;
use crate::protocol::timestamp_now;
use std::sync::Arc;

pub const SYSTEM_AUTHOR: &str = "SYSTEM";

#[derive(Debug, Default)]
pub struct InputState {
    pub text: String,
    pub cursor: usize,
    pub history: Vec<String>,
    pub history_index: Option<usize>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn delete_back(&mut self) {
        if self.cursor > 0 {
            let prev = self.prev_boundary();
            self.text.drain(prev..self.cursor);
            self.cursor = prev;
        }
    }

    pub fn delete_forward(&mut self) {
        if self.cursor < self.text.len() {
            let next = self.next_boundary();
            self.text.drain(self.cursor..next);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    pub fn move_right(&mut self) {
        self.cursor = self.next_boundary();
    }

    fn prev_boundary(&self) -> usize {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.text[self.cursor..]
            .char_indices()
            .nth(1)
            .map(|(i, _)| self.cursor + i)
            .unwrap_or(self.text.len())
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Columns between the prompt and the cursor.
    pub fn cursor_column(&self) -> usize {
        display_width(&self.text[..self.cursor])
    }

    pub fn take_text(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        self.cursor = 0;
        self.history_index = None;
        if !text.trim().is_empty() && self.history.last() != Some(&text) {
            self.history.push(text.clone());
        }
        text
    }

    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let idx = match self.history_index {
            Some(i) if i > 0 => i - 1,
            Some(_) => return,
            None => self.history.len() - 1,
        };
        self.history_index = Some(idx);
        self.text = self.history[idx].clone();
        self.cursor = self.text.len();
    }

    pub fn history_down(&mut self) {
        match self.history_index {
            Some(i) if i + 1 < self.history.len() => {
                let idx = i + 1;
                self.history_index = Some(idx);
                self.text = self.history[idx].clone();
                self.cursor = self.text.len();
            }
            Some(_) => {
                self.history_index = None;
                self.clear();
            }
            None => {}
        }
    }

    pub fn delete_word_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let mut pos = self.cursor;
        // Skip trailing whitespace
        while pos > 0 && self.text.as_bytes().get(pos - 1) == Some(&b' ') {
            pos -= 1;
        }
        while pos > 0 && self.text.as_bytes().get(pos - 1) != Some(&b' ') {
            pos -= 1;
        }
        self.text.drain(pos..self.cursor);
        self.cursor = pos;
    }
}

pub struct AppState {
    pub name: String,
    pub server_label: String,
    pub insecure: bool,
    pub history: Arc<ChatHistory>,
    pub notifier: Arc<Notifier>,
    pub input: InputState,
    pub mouse_scroll_lines: usize,
    pub connected: bool,
    pub should_quit: bool,
    pub dirty: bool,
}

impl AppState {
    pub fn new(
        name: String,
        server_label: String,
        history: Arc<ChatHistory>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            name,
            server_label,
            insecure: false,
            history,
            notifier,
            input: InputState::new(),
            mouse_scroll_lines: 3,
            connected: true,
            should_quit: false,
            dirty: true,
        }
    }

    pub fn system_message(&mut self, text: impl Into<String>) {
        self.history
            .append(ChatEntry::new(SYSTEM_AUTHOR, text, timestamp_now()));
        self.dirty = true;
    }

    /// Status line: scroll position, follow state and key help.
    pub fn status_line(&self) -> String {
        let snap = self.history.snapshot();
        let position = if snap.total == 0 {
            "0/0".to_string()
        } else {
            format!("{}/{}", snap.view_end, snap.total)
        };
        let mode = if snap.follow_bottom {
            "latest"
        } else {
            "scrolled back"
        };
        let link = if !self.connected {
            "disconnected"
        } else if self.insecure {
            "UNVERIFIED TLS"
        } else {
            "tls"
        };
        format!(
            "{} as {} [{}] | {} {} | wheel or PgUp/PgDn scroll, Ctrl+Home top, Ctrl+End bottom",
            self.server_label, self.name, link, position, mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(
            "alice".into(),
            "relay:5050".into(),
            Arc::new(ChatHistory::new(100)),
            Arc::new(Notifier::disabled()),
        )
    }

    #[test]
    fn test_input_editing_respects_char_boundaries() {
        let mut input = InputState::new();
        for c in "a漢b".chars() {
            input.insert_char(c);
        }
        assert_eq!(input.cursor_column(), 4);
        input.move_left();
        input.move_left();
        assert_eq!(input.cursor_column(), 1);
        input.delete_forward();
        assert_eq!(input.text, "ab");
        input.move_end();
        input.delete_back();
        assert_eq!(input.text, "a");
    }

    #[test]
    fn test_history_recall_walks_back_and_forth() {
        let mut input = InputState::new();
        for line in ["one", "two", "two", "  "] {
            input.text = line.into();
            input.take_text();
        }
        assert_eq!(input.history, vec!["one", "two"]);

        input.history_up();
        assert_eq!(input.text, "two");
        input.history_up();
        assert_eq!(input.text, "one");
        input.history_up();
        assert_eq!(input.text, "one");
        input.history_down();
        assert_eq!(input.text, "two");
        input.history_down();
        assert_eq!(input.text, "");
        assert_eq!(input.history_index, None);
    }

    #[test]
    fn test_delete_word_back() {
        let mut input = InputState::new();
        input.text = "hello big world  ".into();
        input.move_end();
        input.delete_word_back();
        assert_eq!(input.text, "hello big ");
    }

    #[test]
    fn test_status_line_tracks_viewport() {
        let mut st = state();
        assert!(st.status_line().contains("0/0 latest"));
        for i in 0..10 {
            st.system_message(format!("line {i}"));
        }
        st.history.render(80, 4);
        assert!(st.status_line().contains("10/10 latest"));
        st.history.scroll_up(3);
        assert!(st.status_line().contains("7/10 scrolled back"));
    }

    #[test]
    fn test_status_line_flags_insecure_and_disconnected() {
        let mut st = state();
        st.insecure = true;
        assert!(st.status_line().contains("UNVERIFIED TLS"));
        st.connected = false;
        assert!(st.status_line().contains("disconnected"));
    }
}
