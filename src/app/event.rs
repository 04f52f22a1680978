use crossterm::event::Event as CrosstermEvent;

#[derive(Debug)]
pub enum AppEvent {
    /// Terminal input event
    Terminal(CrosstermEvent),

    /// The transcript changed and the screen should be redrawn
    Redraw,

    /// The relay closed the connection
    Disconnected,
}
