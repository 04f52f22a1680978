use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub struct AppLayout {
    pub message_area: Rect,
    pub separator: Rect,
    pub status_bar: Rect,
    pub input_box: Rect,
}

pub fn compute_layout(area: Rect) -> AppLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Transcript
            Constraint::Length(1), // Separator
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Input
        ])
        .split(area);

    AppLayout {
        message_area: chunks[0],
        separator: chunks[1],
        status_bar: chunks[2],
        input_box: chunks[3],
    }
}
