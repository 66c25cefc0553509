//! Board model and wire protocol shared by the server and the client.
//!
//! The server's copy of [`check_win`] is the authoritative one. The client
//! calls the same function only to preview an outcome before the server's
//! `GAME_OVER` arrives.

use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 5;
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;
pub const LINE_LENGTH: usize = BOARD_SIZE;

/// Every line that can win the game, in the order they are checked:
/// rows, then columns, then the two diagonals.
pub const WINNING_LINES: [[usize; LINE_LENGTH]; 12] = [
    // Rows
    [0, 1, 2, 3, 4],
    [5, 6, 7, 8, 9],
    [10, 11, 12, 13, 14],
    [15, 16, 17, 18, 19],
    [20, 21, 22, 23, 24],
    // Columns
    [0, 5, 10, 15, 20],
    [1, 6, 11, 16, 21],
    [2, 7, 12, 17, 22],
    [3, 8, 13, 18, 23],
    [4, 9, 14, 19, 24],
    // Diagonals
    [0, 6, 12, 18, 24],
    [4, 8, 12, 16, 20],
];

pub const FULL_GAME_MESSAGE: &str = "Game is full. Only 2 players allowed.";
pub const DISCONNECT_MESSAGE: &str = "Opponent disconnected";

/// One of the two player slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Player {
    Odd,
    Even,
}

impl Player {
    /// Whether a cell value counts towards this player's parity.
    /// Zero never counts for either side.
    pub fn owns_value(self, value: u32) -> bool {
        match self {
            Player::Odd => value > 0 && value % 2 == 1,
            Player::Even => value > 0 && value % 2 == 0,
        }
    }
}

/// How a game ended. `Disconnect` is a sentinel, not a parity win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
    Odd,
    Even,
    Disconnect,
}

impl From<Player> for Winner {
    fn from(player: Player) -> Self {
        match player {
            Player::Odd => Winner::Odd,
            Player::Even => Winner::Even,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinResult {
    pub winner: Player,
    pub line: [usize; LINE_LENGTH],
}

/// Row-major 5x5 grid of counters. Cells only ever grow by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([u32; CELL_COUNT]);

impl Board {
    pub fn new() -> Self {
        Self([0; CELL_COUNT])
    }

    pub fn from_cells(cells: [u32; CELL_COUNT]) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[u32; CELL_COUNT] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied()
    }

    pub fn index_of(row: usize, col: usize) -> Option<usize> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(row * BOARD_SIZE + col)
        } else {
            None
        }
    }

    /// Adds one to the cell at `index` and returns its new value.
    ///
    /// Out-of-range indices are ignored and return `None`; so is an
    /// increment that would overflow the cell.
    pub fn increment(&mut self, index: usize) -> Option<u32> {
        let cell = self.0.get_mut(index)?;
        *cell = cell.checked_add(1)?;
        Some(*cell)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }

    pub fn clear(&mut self) {
        self.0 = [0; CELL_COUNT];
    }
}

/// Scans [`WINNING_LINES`] in declaration order and reports the first line
/// whose five values are all positive and share a parity.
pub fn check_win(board: &Board) -> Option<WinResult> {
    WINNING_LINES.iter().find_map(|line| {
        let values = line.map(|i| board.0[i]);
        [Player::Odd, Player::Even]
            .into_iter()
            .find(|player| values.iter().all(|&v| player.owns_value(v)))
            .map(|winner| WinResult {
                winner,
                line: *line,
            })
    })
}

/// Messages the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    PlayerAssigned {
        player: Player,
        board: Board,
    },
    GameStart {
        board: Board,
    },
    Update {
        square: usize,
        value: u32,
        board: Board,
    },
    GameOver {
        winner: Winner,
        #[serde(rename = "winningLine")]
        winning_line: Option<[usize; LINE_LENGTH]>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn win(result: WinResult) -> Self {
        ServerMessage::GameOver {
            winner: result.winner.into(),
            winning_line: Some(result.line),
            message: None,
        }
    }

    pub fn disconnect() -> Self {
        ServerMessage::GameOver {
            winner: Winner::Disconnect,
            winning_line: None,
            message: Some(DISCONNECT_MESSAGE.to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Messages clients send to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// `square` is signed so negative indices decode and are then ignored.
    Increment { square: i64 },
    Restart,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
