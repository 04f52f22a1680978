use crate::protocol::ClientMessage;

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Send(ClientMessage),
    /// A keystroke, which clears any pending alert
    UserActivity,
    /// The transcript or its viewport changed, or focus came back
    HistoryChanged,
    Quit,
}
