//! Scroll-back transcript shared by the receive task and the UI.
//!
//! One mutex guards the entries and the viewport bookkeeping. The change
//! callback runs after the lock is released, so it may call back into the
//! buffer (for example to render).
//!
//! Viewport invariant, after every mutation:
//! `0 <= view_start <= max(0, total - last_height)`, and while following the
//! bottom `view_start` sits exactly at that maximum.

pub mod format;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub author: String,
    pub text: String,
    pub timestamp: String,
}

impl ChatEntry {
    pub fn new(
        author: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Viewport position for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub total: usize,
    pub view_start: usize,
    pub view_end: usize,
    pub follow_bottom: bool,
    pub height: usize,
}

pub type ChangeCallback = Box<dyn Fn() + Send + Sync>;

struct Inner {
    entries: VecDeque<ChatEntry>,
    max_entries: usize,
    view_start: usize,
    follow_bottom: bool,
    last_height: usize,
}

impl Inner {
    fn max_start(&self, height: usize) -> usize {
        self.entries.len().saturating_sub(height.max(1))
    }

    fn clamp(&self, value: usize, height: usize) -> usize {
        value.min(self.max_start(height))
    }

    fn page_step(&self) -> usize {
        self.last_height.saturating_sub(1).max(1)
    }
}

pub struct ChatHistory {
    inner: Mutex<Inner>,
    on_change: Option<ChangeCallback>,
}

impl ChatHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                max_entries: max_entries.max(1),
                view_start: 0,
                follow_bottom: true,
                last_height: 0,
            }),
            on_change: None,
        }
    }

    /// Install the callback run after every mutation.
    pub fn with_on_change(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify_change(&self) {
        if let Some(callback) = &self.on_change {
            callback();
        }
    }

    pub fn append(&self, entry: ChatEntry) {
        {
            let mut inner = self.lock();
            inner.entries.push_back(entry);
            let overflow = inner.entries.len().saturating_sub(inner.max_entries);
            if overflow > 0 {
                inner.entries.drain(..overflow);
                inner.view_start = inner.view_start.saturating_sub(overflow);
            }
            let height = inner.last_height;
            inner.view_start = if inner.follow_bottom {
                inner.max_start(height)
            } else {
                inner.clamp(inner.view_start, height)
            };
        }
        self.notify_change();
    }

    /// Exactly `height.max(1)` lines for a `width`-column viewport.
    pub fn render(&self, width: usize, height: usize) -> Vec<String> {
        let height = height.max(1);
        let mut inner = self.lock();
        inner.last_height = height;
        inner.view_start = if inner.follow_bottom {
            inner.max_start(height)
        } else {
            inner.clamp(inner.view_start, height)
        };

        let mut lines: Vec<String> = inner
            .entries
            .iter()
            .skip(inner.view_start)
            .take(height)
            .map(|e| format::format_line(&e.author, &e.text, &e.timestamp, width))
            .collect();
        lines.resize(height, String::new());
        lines
    }

    pub fn scroll_up(&self, amount: usize) {
        if amount == 0 {
            return;
        }
        {
            let mut inner = self.lock();
            inner.follow_bottom = false;
            let height = inner.last_height;
            inner.view_start = inner.clamp(inner.view_start.saturating_sub(amount), height);
        }
        self.notify_change();
    }

    pub fn scroll_down(&self, amount: usize) {
        if amount == 0 {
            return;
        }
        {
            let mut inner = self.lock();
            let max_start = inner.max_start(inner.last_height);
            let next = inner.view_start.saturating_add(amount).min(max_start);
            inner.view_start = next;
            inner.follow_bottom = next == max_start;
        }
        self.notify_change();
    }

    pub fn page_up(&self) {
        let step = self.lock().page_step();
        self.scroll_up(step);
    }

    pub fn page_down(&self) {
        let step = self.lock().page_step();
        self.scroll_down(step);
    }

    pub fn scroll_to_top(&self) {
        {
            let mut inner = self.lock();
            inner.follow_bottom = false;
            inner.view_start = 0;
        }
        self.notify_change();
    }

    pub fn scroll_to_bottom(&self) {
        {
            let mut inner = self.lock();
            inner.follow_bottom = true;
            inner.view_start = inner.max_start(inner.last_height);
        }
        self.notify_change();
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let inner = self.lock();
        let total = inner.entries.len();
        HistorySnapshot {
            total,
            view_start: inner.view_start,
            view_end: (inner.view_start + inner.last_height.max(1)).min(total),
            follow_bottom: inner.follow_bottom,
            height: inner.last_height,
        }
    }

    /// The newest entry is inside the viewport.
    pub fn is_at_bottom(&self) -> bool {
        let inner = self.lock();
        inner.follow_bottom || inner.view_start >= inner.max_start(inner.last_height)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn filled(n: usize, max: usize) -> ChatHistory {
        let history = ChatHistory::new(max);
        for i in 0..n {
            history.append(ChatEntry::new("u", format!("m{i}"), "01.01 00:00"));
        }
        history
    }

    fn texts(history: &ChatHistory) -> Vec<String> {
        history.lock().entries.iter().map(|e| e.text.clone()).collect()
    }

    fn assert_viewport_invariant(history: &ChatHistory) {
        let inner = history.lock();
        let max_start = inner.max_start(inner.last_height);
        assert!(
            inner.view_start <= max_start,
            "view_start {} > max {}",
            inner.view_start,
            max_start
        );
        if inner.follow_bottom {
            assert_eq!(inner.view_start, max_start);
        }
    }

    #[test]
    fn test_render_returns_exact_height() {
        let history = filled(7, 100);
        for height in 0..20 {
            let lines = history.render(40, height);
            assert_eq!(lines.len(), height.max(1), "height {height}");
        }
        let empty = ChatHistory::new(10);
        assert_eq!(empty.render(80, 5), vec![String::new(); 5]);
    }

    #[test]
    fn test_render_follows_bottom() {
        let history = filled(10, 100);
        let lines = history.render(40, 3);
        assert!(lines[0].contains("m7"));
        assert!(lines[2].contains("m9"));
        history.append(ChatEntry::new("u", "m10", "01.01 00:00"));
        assert!(history.render(40, 3)[2].contains("m10"));
    }

    #[test]
    fn test_eviction_keeps_newest_entries() {
        let history = filled(25, 10);
        assert_eq!(history.len(), 10);
        let expected: Vec<String> = (15..25).map(|i| format!("m{i}")).collect();
        assert_eq!(texts(&history), expected);
    }

    #[test]
    fn test_eviction_keeps_scrolled_view_on_same_entries() {
        let history = filled(10, 10);
        history.render(40, 3);
        history.scroll_up(4);
        let before = history.render(40, 3);
        assert!(before[0].contains("m3"));

        history.append(ChatEntry::new("u", "m10", "01.01 00:00"));
        history.append(ChatEntry::new("u", "m11", "01.01 00:00"));
        let after = history.render(40, 3);
        assert_eq!(before, after);
    }

    #[test]
    fn test_scroll_bounds_and_follow_reengage() {
        let history = filled(20, 100);
        history.render(40, 5);
        let max_start = 15;

        history.scroll_up(100);
        let snap = history.snapshot();
        assert_eq!(snap.view_start, 0);
        assert!(!snap.follow_bottom);

        history.scroll_down(3);
        assert_eq!(history.snapshot().view_start, 3);
        assert!(!history.snapshot().follow_bottom);

        history.scroll_down(max_start - 3 - 1);
        assert_eq!(history.snapshot().view_start, max_start - 1);
        assert!(!history.snapshot().follow_bottom);

        history.scroll_down(1);
        assert_eq!(history.snapshot().view_start, max_start);
        assert!(history.snapshot().follow_bottom);

        history.scroll_down(50);
        assert_eq!(history.snapshot().view_start, max_start);
        assert!(history.snapshot().follow_bottom);
    }

    #[test]
    fn test_zero_scroll_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let history = ChatHistory::new(10).with_on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        history.scroll_up(0);
        history.scroll_down(0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(history.snapshot().follow_bottom);
    }

    #[test]
    fn test_paging_and_jumps() {
        let history = filled(30, 100);
        history.render(40, 6);
        history.page_up();
        assert_eq!(history.snapshot().view_start, 24 - 5);
        history.scroll_to_top();
        assert_eq!(history.snapshot().view_start, 0);
        history.page_down();
        assert_eq!(history.snapshot().view_start, 5);
        history.scroll_to_bottom();
        let snap = history.snapshot();
        assert_eq!(snap.view_start, 24);
        assert_eq!(snap.view_end, 30);
        assert!(snap.follow_bottom);
    }

    #[test]
    fn test_scrolled_view_stays_put_while_appending() {
        let history = filled(10, 100);
        history.render(40, 4);
        history.scroll_up(2);
        let start = history.snapshot().view_start;
        history.append(ChatEntry::new("u", "new", "01.01 00:00"));
        assert_eq!(history.snapshot().view_start, start);
        assert!(!history.is_at_bottom());
    }

    #[test]
    fn test_invariant_holds_under_mixed_operations() {
        let history = ChatHistory::new(16);
        let mut seed: u32 = 0x2545_f491;
        for step in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let arg = ((seed >> 8) % 12) as usize;
            match (seed >> 20) % 9 {
                0 | 1 => history.append(ChatEntry::new("u", format!("{step}"), "t")),
                2 => {
                    let lines = history.render(30, arg);
                    assert_eq!(lines.len(), arg.max(1));
                }
                3 => history.scroll_up(arg),
                4 => history.scroll_down(arg),
                5 => history.page_up(),
                6 => history.page_down(),
                7 => history.scroll_to_top(),
                _ => history.scroll_to_bottom(),
            }
            assert_viewport_invariant(&history);
            assert!(history.len() <= 16);
        }
    }

    #[test]
    fn test_callback_may_reenter_buffer() {
        let history = Arc::new_cyclic(|weak: &std::sync::Weak<ChatHistory>| {
            let weak = weak.clone();
            ChatHistory::new(10).with_on_change(move || {
                if let Some(history) = weak.upgrade() {
                    let _ = history.render(20, 2);
                    let _ = history.snapshot();
                }
            })
        });
        history.append(ChatEntry::new("u", "hi", "t"));
        history.scroll_up(1);
        history.scroll_to_bottom();
        assert_eq!(history.len(), 1);
    }
}
