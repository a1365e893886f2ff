use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crawl_engine::{InputAction, InputSnapshot, InputSource};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Press(InputAction),
    Quit,
}

/// Reads one command per stdin line on a background thread.
/// Each command is a press on one poll and a release on the next.
pub(crate) struct ConsoleInputSource {
    commands: Receiver<ConsoleCommand>,
    last: InputSnapshot,
    holding: bool,
    closed: bool,
}

impl ConsoleInputSource {
    pub(crate) fn spawn() -> Self {
        let (sender, commands) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("console_input".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    match parse_command(&line) {
                        Some(command) => {
                            if sender.send(command).is_err() {
                                return;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => warn!(line = line.as_str(), "unknown_console_command"),
                    }
                }
                let _ = sender.send(ConsoleCommand::Quit);
            });
        if let Err(err) = spawned {
            warn!(error = %err, "console_input_thread_failed");
        }
        info!("console_input_ready; keys: wasd/qezc move, g pickup, i inventory, x drop, v view, f info, t confirm, esc back, quit");

        Self {
            commands,
            last: InputSnapshot::empty(),
            holding: false,
            closed: false,
        }
    }
}

impl InputSource for ConsoleInputSource {
    fn poll(&mut self) -> InputSnapshot {
        let mut snapshot = self.last.next_frame();
        if std::mem::take(&mut self.holding) {
            self.last = snapshot;
            return snapshot.with_quit_requested(self.closed);
        }
        match self.commands.try_recv() {
            Ok(ConsoleCommand::Press(action)) => {
                debug!(?action, "console_press");
                snapshot = snapshot.with_action_down(action, true);
                self.holding = true;
            }
            Ok(ConsoleCommand::Quit) => self.closed = true,
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.closed = true,
        }
        self.last = snapshot;
        snapshot.with_quit_requested(self.closed)
    }
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let action = match line.trim().to_ascii_lowercase().as_str() {
        "quit" => return Some(ConsoleCommand::Quit),
        "w" => InputAction::MoveUp,
        "s" => InputAction::MoveDown,
        "a" => InputAction::MoveLeft,
        "d" => InputAction::MoveRight,
        "q" => InputAction::MoveUpLeft,
        "e" => InputAction::MoveUpRight,
        "z" => InputAction::MoveDownLeft,
        "c" => InputAction::MoveDownRight,
        "t" | "enter" => InputAction::Confirm,
        "esc" => InputAction::Exit,
        "g" => InputAction::Pickup,
        "i" => InputAction::Inventory,
        "x" => InputAction::Drop,
        "v" => InputAction::View,
        "f" => InputAction::Info,
        _ => return None,
    };
    Some(ConsoleCommand::Press(action))
}
