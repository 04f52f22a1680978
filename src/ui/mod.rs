mod input_box;
mod layout;
mod message_area;
mod status_bar;
mod theme;

use crate::app::state::AppState;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

pub fn render(frame: &mut Frame, state: &AppState) {
    let area = frame.area();
    let app_layout = layout::compute_layout(area);

    message_area::render(frame, app_layout.message_area, state);
    render_separator(frame, app_layout.separator);
    status_bar::render(frame, app_layout.status_bar, state);
    input_box::render(frame, app_layout.input_box, state);
}

fn render_separator(frame: &mut Frame, area: Rect) {
    let rule = "-".repeat(area.width as usize);
    frame.render_widget(Paragraph::new(rule).style(theme::Theme::separator()), area);
}
