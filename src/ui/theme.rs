use ratatui::style::{Color, Modifier, Style};

pub struct Theme;

impl Theme {
    pub fn separator() -> Style {
        Style::default().fg(Color::DarkGray)
    }

    pub fn timestamp() -> Style {
        Style::default().fg(Color::DarkGray)
    }

    pub fn own_message() -> Style {
        Style::default().fg(Color::Green)
    }

    pub fn message_text() -> Style {
        Style::default().fg(Color::White)
    }

    pub fn system_message() -> Style {
        Style::default().fg(Color::Yellow)
    }

    pub fn warning() -> Style {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    }

    pub fn prompt() -> Style {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    }

    pub fn input_text() -> Style {
        Style::default().fg(Color::White)
    }

    pub fn status_bar() -> Style {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    }
}
