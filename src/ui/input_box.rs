use crate::app::state::AppState;
use crate::history::format::{char_width, display_width};
use crate::ui::theme::Theme;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

const PROMPT: &str = "> ";

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let prompt_width = display_width(PROMPT);
    let cursor_col = state.input.cursor_column();
    let visible = (area.width as usize).saturating_sub(prompt_width + 1);

    // Scroll the line horizontally so the cursor stays on screen.
    let skip_cols = cursor_col.saturating_sub(visible);
    let mut skipped = 0;
    let start = state
        .input
        .text
        .char_indices()
        .find(|(_, c)| {
            if skipped >= skip_cols {
                return true;
            }
            skipped += char_width(*c);
            false
        })
        .map(|(i, _)| i)
        .unwrap_or(state.input.text.len());
    let shown = &state.input.text[start..];

    let line = Line::from(vec![
        Span::styled(PROMPT, Theme::prompt()),
        Span::styled(shown, Theme::input_text()),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    let offset = (prompt_width + cursor_col - skipped) as u16;
    let cursor_x = (area.x + offset).min(area.right().saturating_sub(1));
    frame.set_cursor_position((cursor_x, area.y));
}
