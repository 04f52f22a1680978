use crate::app::state::AppState;
use crate::history::format::clip_width;
use crate::ui::theme::Theme;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

pub fn render(frame: &mut Frame, area: Rect, state: &AppState) {
    let status = state.status_line();
    let text = clip_width(&status, (area.width as usize).saturating_sub(1));
    let style = if state.insecure || !state.connected {
        Theme::status_bar().fg(Color::LightRed)
    } else {
        Theme::status_bar()
    };
    // Style covers the full width so the bar is solid.
    let paragraph = Paragraph::new(Line::from(Span::styled(format!(" {text}"), style))).style(style);
    frame.render_widget(paragraph, area);
}
