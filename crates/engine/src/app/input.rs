#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveUpLeft,
    MoveUpRight,
    MoveDownLeft,
    MoveDownRight,
    Confirm,
    Exit,
    Pickup,
    Inventory,
    Drop,
    View,
    Info,
    Quit,
}

const ACTION_COUNT: usize = 16;

/// Discrete phase of a button between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    Idle,
    Started,
    Held,
    Released,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn any_down(&self) -> bool {
        self.down.iter().any(|down| *down)
    }
}

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::MoveUpLeft,
        InputAction::MoveUpRight,
        InputAction::MoveDownLeft,
        InputAction::MoveDownRight,
        InputAction::Confirm,
        InputAction::Exit,
        InputAction::Pickup,
        InputAction::Inventory,
        InputAction::Drop,
        InputAction::View,
        InputAction::Info,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::MoveUpLeft => 4,
            InputAction::MoveUpRight => 5,
            InputAction::MoveDownLeft => 6,
            InputAction::MoveDownRight => 7,
            InputAction::Confirm => 8,
            InputAction::Exit => 9,
            InputAction::Pickup => 10,
            InputAction::Inventory => 11,
            InputAction::Drop => 12,
            InputAction::View => 13,
            InputAction::Info => 14,
            InputAction::Quit => 15,
        }
    }

    /// Unit grid direction for movement actions, `None` for everything else.
    pub const fn direction(self) -> Option<(i32, i32)> {
        match self {
            InputAction::MoveUp => Some((0, 1)),
            InputAction::MoveDown => Some((0, -1)),
            InputAction::MoveLeft => Some((-1, 0)),
            InputAction::MoveRight => Some((1, 0)),
            InputAction::MoveUpLeft => Some((-1, 1)),
            InputAction::MoveUpRight => Some((1, 1)),
            InputAction::MoveDownLeft => Some((-1, -1)),
            InputAction::MoveDownRight => Some((1, -1)),
            _ => None,
        }
    }

    pub const fn is_movement(self) -> bool {
        self.direction().is_some()
    }
}

pub(crate) fn phase_between(was_down: bool, is_down: bool) -> ButtonPhase {
    match (was_down, is_down) {
        (false, false) => ButtonPhase::Idle,
        (false, true) => ButtonPhase::Started,
        (true, true) => ButtonPhase::Held,
        (true, false) => ButtonPhase::Released,
    }
}
