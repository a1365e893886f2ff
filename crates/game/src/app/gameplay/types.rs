#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fighter {
    max_hp: i32,
    hp: i32,
    power: i32,
    defense: i32,
    target: Option<EntityId>,
}

impl Fighter {
    fn from_template(template: &ActorTemplate) -> Self {
        Self {
            max_hp: template.max_hp,
            hp: template.max_hp,
            power: template.power,
            defense: template.defense,
            target: None,
        }
    }

    /// Restores up to `amount` hit points and returns how many were actually recovered.
    fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
        self.hp - before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Inventory {
    capacity: usize,
    items: Vec<EntityId>,
    selected_consumable: Option<EntityId>,
}

impl Inventory {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn remove(&mut self, item: EntityId) -> bool {
        let Some(index) = self.items.iter().position(|held| *held == item) else {
            return false;
        };
        self.items.remove(index);
        if self.selected_consumable == Some(item) {
            self.selected_consumable = None;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostilePhase {
    Idle,
    Pursuing,
    Engaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HostileEnemy {
    /// Sticky aggro: once set, the enemy keeps chasing even without line of sight.
    is_fighting: bool,
    phase: HostilePhase,
}

impl Default for HostileEnemy {
    fn default() -> Self {
        Self {
            is_fighting: false,
            phase: HostilePhase::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AiBehavior {
    Hostile(HostileEnemy),
}

impl AiBehavior {
    fn from_controller(controller: Option<AiController>) -> Option<Self> {
        match controller {
            Some(AiController::HostileEnemy) => Some(Self::Hostile(HostileEnemy::default())),
            Some(AiController::Player) | None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Actor {
    is_player: bool,
    is_alive: bool,
    fov_radius: i32,
    field_of_view: HashSet<GridPos>,
    fighter: Fighter,
    inventory: Inventory,
    ai: Option<AiBehavior>,
}

impl Actor {
    fn from_template(template: &ActorTemplate) -> Self {
        let is_player = template.controller == Some(AiController::Player);
        Self {
            is_player,
            is_alive: true,
            fov_radius: template.fov_radius,
            field_of_view: HashSet::new(),
            fighter: Fighter::from_template(template),
            inventory: Inventory::with_capacity(if is_player {
                PLAYER_INVENTORY_CAPACITY
            } else {
                0
            }),
            ai: AiBehavior::from_controller(template.controller),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Item {
    owner: Option<EntityId>,
    consumable: Option<ConsumableTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Message {
    text: String,
    color: &'static str,
}

/// Menu flags and the message log. Presentation is left to the renderer.
#[derive(Debug, Clone, Default)]
struct UiState {
    escape_menu_open: bool,
    inventory_open: bool,
    drop_menu_open: bool,
    message_history_open: bool,
    character_info_open: bool,
    menu_cursor: usize,
    messages: Vec<Message>,
}

impl UiState {
    fn is_menu_open(&self) -> bool {
        self.escape_menu_open
            || self.inventory_open
            || self.drop_menu_open
            || self.message_history_open
            || self.character_info_open
    }

    fn close_menus(&mut self) {
        self.escape_menu_open = false;
        self.inventory_open = false;
        self.drop_menu_open = false;
        self.message_history_open = false;
        self.character_info_open = false;
        self.menu_cursor = 0;
    }

    fn add_message(&mut self, text: impl Into<String>, color: &'static str) {
        let text = text.into();
        debug!(text = text.as_str(), color, "message");
        self.messages.push(Message { text, color });
        if self.messages.len() > MESSAGE_LOG_LIMIT {
            let overflow = self.messages.len() - MESSAGE_LOG_LIMIT;
            self.messages.drain(..overflow);
        }
    }

    fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct SavedGridPos {
    x: i32,
    y: i32,
}

impl SavedGridPos {
    fn from_grid(value: GridPos) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }

    fn to_grid(self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FighterState {
    max_hp: i32,
    hp: i32,
    power: i32,
    defense: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum AiKind {
    HostileEnemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct AiState {
    kind: AiKind,
    #[serde(default)]
    is_fighting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ActorState {
    name: String,
    position: SavedGridPos,
    blocks_movement: bool,
    is_alive: bool,
    fighter: FighterState,
    #[serde(default)]
    ai: Option<AiState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ItemState {
    name: String,
    position: SavedGridPos,
    /// Owner's display name, or `"World"` for items lying on the floor.
    parent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
enum EntityState {
    Actor(ActorState),
    Item(ItemState),
}

impl EntityState {
    fn name(&self) -> &str {
        match self {
            Self::Actor(state) => &state.name,
            Self::Item(state) => &state.name,
        }
    }

    fn position(&self) -> GridPos {
        match self {
            Self::Actor(state) => state.position.to_grid(),
            Self::Item(state) => state.position.to_grid(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct GameState {
    entities: Vec<EntityState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SceneState {
    floor_number: u32,
    game_state: GameState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SaveFile {
    save_version: u32,
    current_floor: u32,
    scenes: Vec<SceneState>,
}

impl Default for SaveFile {
    fn default() -> Self {
        Self {
            save_version: SAVE_VERSION,
            current_floor: FIRST_FLOOR,
            scenes: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
enum LoadError {
    #[error("unknown entity template '{name}'")]
    UnknownEntity { name: String },
    #[error("template '{name}' is {actual} but the record expects {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("template database is not set on the scene world")]
    MissingTemplates,
}

#[derive(Debug, Error)]
enum SaveError {
    #[error("failed to read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to parse save json{location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: expected {expected}, got {actual}")]
    Validation {
        path: String,
        expected: String,
        actual: String,
    },
}

impl SaveError {
    fn expected_actual(path: impl Into<String>, expected: impl Display, actual: impl Display) -> Self {
        Self::Validation {
            path: path.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadProgress {
    Idle,
    InProgress { loaded: usize, total: usize },
    Finished { total: usize },
}
