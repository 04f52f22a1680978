use crate::app::action::Action;
use crate::app::commands::{self, ParsedCommand, ParsedInput};
use crate::app::event::AppEvent;
use crate::app::state::AppState;
use crate::protocol::ClientMessage;
use crossterm::event::{
    Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};

pub fn handle_event(state: &mut AppState, event: AppEvent) -> Vec<Action> {
    match event {
        AppEvent::Terminal(cevent) => handle_terminal(state, cevent),
        AppEvent::Redraw => {
            state.dirty = true;
            vec![Action::HistoryChanged]
        }
        AppEvent::Disconnected => {
            state.connected = false;
            state.dirty = true;
            vec![Action::Quit]
        }
    }
}

fn handle_terminal(state: &mut AppState, event: CEvent) -> Vec<Action> {
    match event {
        CEvent::Key(key) if key.kind != KeyEventKind::Release => {
            state.dirty = true;
            let mut actions = vec![Action::UserActivity];
            actions.extend(handle_key(state, key));
            actions
        }
        CEvent::Mouse(mouse) => handle_mouse(state, mouse),
        CEvent::Resize(_, _) => {
            state.dirty = true;
            vec![]
        }
        CEvent::FocusGained => {
            state.notifier.set_focus(true);
            vec![Action::HistoryChanged]
        }
        CEvent::FocusLost => {
            state.notifier.set_focus(false);
            vec![]
        }
        _ => vec![],
    }
}

fn handle_key(state: &mut AppState, key: KeyEvent) -> Vec<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => vec![Action::Send(ClientMessage::Leave), Action::Quit],
        KeyCode::Enter => handle_submit(state),
        KeyCode::PageUp => {
            state.history.page_up();
            vec![]
        }
        KeyCode::PageDown => {
            state.history.page_down();
            vec![]
        }
        KeyCode::Home if ctrl => {
            state.history.scroll_to_top();
            vec![]
        }
        KeyCode::End if ctrl => {
            state.history.scroll_to_bottom();
            vec![]
        }
        KeyCode::Backspace => {
            if key.modifiers.contains(KeyModifiers::ALT) {
                state.input.delete_word_back();
            } else {
                state.input.delete_back();
            }
            vec![]
        }
        KeyCode::Delete => {
            state.input.delete_forward();
            vec![]
        }
        KeyCode::Left => {
            state.input.move_left();
            vec![]
        }
        KeyCode::Right => {
            state.input.move_right();
            vec![]
        }
        KeyCode::Home => {
            state.input.move_home();
            vec![]
        }
        KeyCode::End => {
            state.input.move_end();
            vec![]
        }
        KeyCode::Up => {
            state.input.history_up();
            vec![]
        }
        KeyCode::Down => {
            state.input.history_down();
            vec![]
        }
        KeyCode::Char(c) => {
            if ctrl {
                match c {
                    'a' => state.input.move_home(),
                    'e' => state.input.move_end(),
                    'w' => state.input.delete_word_back(),
                    'u' => state.input.clear(),
                    _ => {}
                }
            } else {
                state.input.insert_char(c);
            }
            vec![]
        }
        _ => vec![],
    }
}

fn handle_mouse(state: &mut AppState, mouse: MouseEvent) -> Vec<Action> {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            state.history.scroll_up(state.mouse_scroll_lines);
            vec![]
        }
        MouseEventKind::ScrollDown => {
            state.history.scroll_down(state.mouse_scroll_lines);
            vec![]
        }
        _ => vec![],
    }
}

fn handle_submit(state: &mut AppState) -> Vec<Action> {
    let text = state.input.take_text();
    let Some(parsed) = commands::parse_input(&text) else {
        return vec![];
    };
    match parsed {
        ParsedInput::Command(ParsedCommand::Exit) => {
            vec![Action::Send(ClientMessage::Leave), Action::Quit]
        }
        ParsedInput::Command(ParsedCommand::Help) => {
            for line in commands::HELP_LINES {
                state.system_message(*line);
            }
            vec![]
        }
        ParsedInput::Command(ParsedCommand::Unknown(cmd)) => {
            state.system_message(format!("Unknown command: /{cmd} (try /help)"));
            vec![]
        }
        _ if !state.connected => {
            state.system_message("Not connected to the relay.");
            vec![]
        }
        ParsedInput::Command(ParsedCommand::List) => vec![Action::Send(ClientMessage::List)],
        ParsedInput::Chat(text) => vec![Action::Send(ClientMessage::Chat { text })],
    }
}
