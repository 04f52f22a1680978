use crate::app::state::{AppState, SYSTEM_AUTHOR};
use crate::ui::theme::Theme;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

pub const INSECURE_BANNER: &str =
    "WARNING: certificate verification is disabled; this session can be intercepted.";

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    if area.height == 0 {
        return;
    }
    let mut lines: Vec<Line> = Vec::with_capacity(area.height as usize);
    let mut transcript_height = area.height as usize;
    if state.insecure {
        lines.push(Line::from(Span::styled(INSECURE_BANNER, Theme::warning())));
        transcript_height -= 1;
    }
    if transcript_height > 0 {
        let own_prefix = format!("[{}]", state.name);
        let system_prefix = format!("[{SYSTEM_AUTHOR}]");
        for text in state.history.render(area.width as usize, transcript_height) {
            let body_style = if text.starts_with(&system_prefix) {
                Theme::system_message()
            } else if text.starts_with(&own_prefix) {
                Theme::own_message()
            } else {
                Theme::message_text()
            };
            lines.push(styled_line(text, body_style));
        }
    }
    frame.render_widget(Paragraph::new(lines), area);
}

/// Dim the trailing `[timestamp]` column.
fn styled_line(text: String, body_style: Style) -> Line<'static> {
    match text.rfind('[') {
        Some(idx) if idx > 0 && text.ends_with(']') => {
            let stamp = text[idx..].to_string();
            let mut body = text;
            body.truncate(idx);
            Line::from(vec![
                Span::styled(body, body_style),
                Span::styled(stamp, Theme::timestamp()),
            ])
        }
        _ => Line::from(Span::styled(text, body_style)),
    }
}
