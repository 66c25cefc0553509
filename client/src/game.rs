//! Client-side mirror of the server's session
//!
//! Clicks are applied to the local board immediately and remembered as
//! pending until the server's `UPDATE` for that square arrives. Every
//! `UPDATE` replaces the local board with the server's, so optimistic
//! increments that the server dropped simply disappear.

use crate::network::NetworkEvent;
use log::{debug, info, warn};
use shared::{check_win, Board, ClientMessage, Player, ServerMessage, WinResult, Winner, LINE_LENGTH};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    WaitingForOpponent,
    OpponentDisconnected,
    Disconnected,
    Error(String),
}

pub struct ClientGameState {
    pub board: Board,
    pub player: Option<Player>,
    pub status: ConnectionStatus,
    pub game_started: bool,
    /// Outcome announced by the server
    pub outcome: Option<Winner>,
    pub winning_line: Option<[usize; LINE_LENGTH]>,
    /// Local guess at the outcome from the last server board. Never authoritative.
    pub preview: Option<WinResult>,
    pub pending_squares: HashSet<usize>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            player: None,
            status: ConnectionStatus::Connecting,
            game_started: false,
            outcome: None,
            winning_line: None,
            preview: None,
            pending_squares: HashSet::new(),
        }
    }

    fn clear_outcome(&mut self) {
        self.outcome = None;
        self.winning_line = None;
        self.preview = None;
    }

    pub fn apply_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected => {
                info!("Connected to server");
                self.status = ConnectionStatus::Connected;
            }
            NetworkEvent::Message(message) => self.apply_server_message(message),
            NetworkEvent::Disconnected => {
                info!("Disconnected from server");
                self.status = ConnectionStatus::Disconnected;
            }
            NetworkEvent::Error(reason) => {
                warn!("Connection error: {}", reason);
                self.status = ConnectionStatus::Error(reason);
            }
        }
    }

    pub fn apply_server_message(&mut self, message: ServerMessage) {
        debug!("Received {:?}", message);

        match message {
            ServerMessage::PlayerAssigned { player, board } => {
                self.player = Some(player);
                self.board = board;
                self.clear_outcome();
                self.status = ConnectionStatus::WaitingForOpponent;
            }
            ServerMessage::GameStart { board } => {
                self.game_started = true;
                self.status = ConnectionStatus::Connected;
                self.board = board;
                self.clear_outcome();
                self.pending_squares.clear();
            }
            ServerMessage::Update { square, board, .. } => {
                self.board = board;
                self.pending_squares.remove(&square);
                if self.outcome.is_none() {
                    self.preview = check_win(&self.board);
                }
            }
            ServerMessage::GameOver {
                winner,
                winning_line,
                ..
            } => {
                if winner == Winner::Disconnect {
                    self.status = ConnectionStatus::OpponentDisconnected;
                } else {
                    self.winning_line = winning_line;
                }
                self.outcome = Some(winner);
                self.preview = None;
            }
            ServerMessage::Error { message } => {
                self.status = ConnectionStatus::Error(message);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some() || self.preview.is_some()
    }

    pub fn can_play(&self) -> bool {
        self.game_started && !self.is_finished()
    }

    /// Applies a click locally and returns the message to send, if the
    /// board is currently playable.
    pub fn click(&mut self, square: usize) -> Option<ClientMessage> {
        if !self.can_play() {
            return None;
        }

        self.board.increment(square)?;
        self.pending_squares.insert(square);
        Some(ClientMessage::Increment {
            square: square as i64,
        })
    }

    /// Clears the local result and returns the restart request. Only offered
    /// once a game has ended.
    pub fn request_restart(&mut self) -> Option<ClientMessage> {
        if !self.is_finished() {
            return None;
        }

        self.clear_outcome();
        self.board.clear();
        self.pending_squares.clear();
        Some(ClientMessage::Restart)
    }

    /// The line to highlight: the server's if it has spoken, else the preview
    pub fn highlighted_line(&self) -> Option<[usize; LINE_LENGTH]> {
        self.winning_line.or(self.preview.map(|p| p.line))
    }

    fn displayed_winner(&self) -> Option<Winner> {
        self.outcome.or(self.preview.map(|p| p.winner.into()))
    }

    pub fn player_line(&self) -> String {
        match self.player {
            Some(Player::Odd) => "You are ODD Player".to_string(),
            Some(Player::Even) => "You are EVEN Player".to_string(),
            None => "Assigning player...".to_string(),
        }
    }

    pub fn status_line(&self) -> String {
        match self.displayed_winner() {
            Some(Winner::Disconnect) => "Opponent disconnected - Game ended".to_string(),
            Some(Winner::Odd) => "ODD PLAYER WINS!".to_string(),
            Some(Winner::Even) => "EVEN PLAYER WINS!".to_string(),
            None if self.game_started => format!("Active Game - {}", self.connection_text()),
            None => self.connection_text(),
        }
    }

    pub fn hint_line(&self) -> Option<&'static str> {
        if !self.can_play() {
            return None;
        }
        match self.player {
            Some(Player::Odd) => Some("Help odd numbers win (1, 3, 5, 7, ...)"),
            Some(Player::Even) => Some("Help even numbers win (2, 4, 6, 8, ...)"),
            None => None,
        }
    }

    fn connection_text(&self) -> String {
        match &self.status {
            ConnectionStatus::Connecting => "Connecting...".to_string(),
            ConnectionStatus::Connected => "Connected".to_string(),
            ConnectionStatus::WaitingForOpponent => "Waiting for opponent...".to_string(),
            ConnectionStatus::OpponentDisconnected => "Opponent disconnected".to_string(),
            ConnectionStatus::Disconnected => "Disconnected".to_string(),
            ConnectionStatus::Error(reason) => format!("Error: {}", reason),
        }
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(player: Player) -> ClientGameState {
        let mut state = ClientGameState::new();
        state.apply_server_message(ServerMessage::PlayerAssigned {
            player,
            board: Board::new(),
        });
        state.apply_server_message(ServerMessage::GameStart {
            board: Board::new(),
        });
        state
    }

    fn board_with(cells: &[(usize, u32)]) -> Board {
        let mut board = Board::new();
        for &(i, v) in cells {
            for _ in 0..v {
                board.increment(i);
            }
        }
        board
    }

    #[test]
    fn test_initial_state() {
        let state = ClientGameState::new();
        assert_eq!(state.status, ConnectionStatus::Connecting);
        assert!(!state.can_play());
        assert_eq!(state.player_line(), "Assigning player...");
        assert_eq!(state.status_line(), "Connecting...");
    }

    #[test]
    fn test_assignment_waits_for_opponent() {
        let mut state = ClientGameState::new();
        state.apply_server_message(ServerMessage::PlayerAssigned {
            player: Player::Even,
            board: Board::new(),
        });

        assert_eq!(state.player, Some(Player::Even));
        assert_eq!(state.status_line(), "Waiting for opponent...");
        assert!(!state.can_play());
        assert_eq!(state.click(0), None);
    }

    #[test]
    fn test_click_is_optimistic_and_pending() {
        let mut state = started(Player::Odd);

        assert_eq!(state.click(6), Some(ClientMessage::Increment { square: 6 }));
        assert_eq!(state.board.get(6), Some(1));
        assert!(state.pending_squares.contains(&6));
        assert_eq!(state.status_line(), "Active Game - Connected");
        assert!(state.hint_line().is_some());
    }

    #[test]
    fn test_click_out_of_range_sends_nothing() {
        let mut state = started(Player::Odd);
        assert_eq!(state.click(25), None);
        assert!(state.pending_squares.is_empty());
    }

    #[test]
    fn test_update_reconciles_to_server_board() {
        let mut state = started(Player::Odd);
        state.click(3);
        state.click(3);

        // The server has only seen one of the two clicks so far.
        let server_board = board_with(&[(3, 1)]);
        state.apply_server_message(ServerMessage::Update {
            square: 3,
            value: 1,
            board: server_board,
        });

        assert_eq!(state.board, server_board);
        assert!(!state.pending_squares.contains(&3));
    }

    #[test]
    fn test_update_previews_win_before_game_over() {
        let mut state = started(Player::Odd);
        let board = board_with(&[(0, 1), (1, 1), (2, 1), (3, 1), (4, 1)]);
        state.apply_server_message(ServerMessage::Update {
            square: 4,
            value: 1,
            board,
        });

        assert!(state.is_finished());
        assert_eq!(state.outcome, None);
        assert_eq!(state.highlighted_line(), Some([0, 1, 2, 3, 4]));
        assert_eq!(state.status_line(), "ODD PLAYER WINS!");
        assert_eq!(state.click(10), None);
    }

    #[test]
    fn test_game_over_is_authoritative() {
        let mut state = started(Player::Even);
        state.apply_server_message(ServerMessage::GameOver {
            winner: Winner::Even,
            winning_line: Some([4, 9, 14, 19, 24]),
            message: None,
        });

        assert_eq!(state.outcome, Some(Winner::Even));
        assert_eq!(state.highlighted_line(), Some([4, 9, 14, 19, 24]));
        assert_eq!(state.status_line(), "EVEN PLAYER WINS!");
        assert!(state.hint_line().is_none());
    }

    #[test]
    fn test_disconnect_game_over() {
        let mut state = started(Player::Odd);
        state.apply_server_message(ServerMessage::disconnect());

        assert_eq!(state.status, ConnectionStatus::OpponentDisconnected);
        assert_eq!(state.outcome, Some(Winner::Disconnect));
        assert_eq!(state.highlighted_line(), None);
        assert_eq!(state.status_line(), "Opponent disconnected - Game ended");
    }

    #[test]
    fn test_restart_only_after_game_end() {
        let mut state = started(Player::Odd);
        state.click(0);
        assert_eq!(state.request_restart(), None);

        state.apply_server_message(ServerMessage::disconnect());
        assert_eq!(state.request_restart(), Some(ClientMessage::Restart));
        assert!(state.board.is_empty());
        assert!(!state.is_finished());
    }

    #[test]
    fn test_game_start_clears_previous_result() {
        let mut state = started(Player::Odd);
        state.click(1);
        state.apply_server_message(ServerMessage::GameOver {
            winner: Winner::Odd,
            winning_line: Some([0, 1, 2, 3, 4]),
            message: None,
        });
        state.apply_server_message(ServerMessage::GameStart {
            board: Board::new(),
        });

        assert!(state.can_play());
        assert!(state.pending_squares.is_empty());
        assert_eq!(state.highlighted_line(), None);
    }

    #[test]
    fn test_error_and_connection_events() {
        let mut state = ClientGameState::new();
        state.apply_event(NetworkEvent::Connected);
        assert_eq!(state.status_line(), "Connected");

        state.apply_server_message(ServerMessage::Error {
            message: shared::FULL_GAME_MESSAGE.to_string(),
        });
        assert_eq!(
            state.status_line(),
            format!("Error: {}", shared::FULL_GAME_MESSAGE)
        );

        state.apply_event(NetworkEvent::Disconnected);
        assert_eq!(state.status_line(), "Disconnected");
    }
}
