//! The single authoritative game session
//!
//! A [`Session`] owns the board, the two player slots and the outcome of the
//! current game. Every change goes through one of its transition methods,
//! each of which runs to completion and pushes the resulting messages out
//! through the [`ClientManager`] before returning.
//!
//! Slots hold a [`ClientId`], never the connection itself. Closing a
//! connection does not touch the session until [`Session::disconnect`] is
//! called for it.

use crate::client_manager::{ClientId, ClientManager};
use log::{debug, info, warn};
use shared::{
    check_win, Board, ClientMessage, Player, ServerMessage, Winner, FULL_GAME_MESSAGE, LINE_LENGTH,
};

/// Coarse lifecycle of the session, derived from its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Fewer than two slots are bound and no game has ended
    WaitingForPlayers,
    /// Both slots are bound and the game has not ended
    InProgress,
    /// The game has ended, by a parity win or by a disconnect
    Finished,
}

/// Result of a connection asking to join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Assigned(Player),
    Rejected,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    board: Board,
    odd_player: Option<ClientId>,
    even_player: Option<ClientId>,
    game_over: bool,
    winner: Option<Winner>,
    winning_line: Option<[usize; LINE_LENGTH]>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session to its start-of-process shape, slots included
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn clear_game(&mut self) {
        self.board.clear();
        self.game_over = false;
        self.winner = None;
        self.winning_line = None;
    }

    pub fn phase(&self) -> SessionPhase {
        if self.game_over {
            SessionPhase::Finished
        } else if self.odd_player.is_some() && self.even_player.is_some() {
            SessionPhase::InProgress
        } else {
            SessionPhase::WaitingForPlayers
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn winning_line(&self) -> Option<[usize; LINE_LENGTH]> {
        self.winning_line
    }

    pub fn slot_of(&self, client_id: ClientId) -> Option<Player> {
        if self.odd_player == Some(client_id) {
            Some(Player::Odd)
        } else if self.even_player == Some(client_id) {
            Some(Player::Even)
        } else {
            None
        }
    }

    pub fn connection_of(&self, player: Player) -> Option<ClientId> {
        match player {
            Player::Odd => self.odd_player,
            Player::Even => self.even_player,
        }
    }

    fn both_slots_bound(&self) -> bool {
        self.odd_player.is_some() && self.even_player.is_some()
    }

    fn game_start(&self) -> ServerMessage {
        ServerMessage::GameStart { board: self.board }
    }

    /// Binds a new connection to the first free slot, ODD before EVEN.
    ///
    /// Filling the EVEN slot starts the game for everyone. A connection that
    /// finds both slots taken gets an `ERROR` and is closed; the session is
    /// left untouched.
    pub fn join(&mut self, client_id: ClientId, clients: &mut ClientManager) -> JoinOutcome {
        let player = if self.odd_player.is_none() {
            self.odd_player = Some(client_id);
            Player::Odd
        } else if self.even_player.is_none() {
            self.even_player = Some(client_id);
            if self.game_over {
                // A game that ended while this slot was empty cannot be resumed.
                self.clear_game();
            }
            Player::Even
        } else {
            warn!("Rejecting client {}: both slots are taken", client_id);
            clients.send_to(
                client_id,
                &ServerMessage::Error {
                    message: FULL_GAME_MESSAGE.to_string(),
                },
            );
            clients.close_client(client_id);
            return JoinOutcome::Rejected;
        };

        info!("Client {} assigned to {:?}", client_id, player);
        clients.send_to(
            client_id,
            &ServerMessage::PlayerAssigned {
                player,
                board: self.board,
            },
        );

        if player == Player::Even {
            info!("Both players connected, starting game");
            clients.broadcast(&self.game_start());
        }

        JoinOutcome::Assigned(player)
    }

    /// Dispatches a decoded client message. Messages from connections that
    /// hold no slot are ignored.
    pub fn handle_message(
        &mut self,
        client_id: ClientId,
        message: ClientMessage,
        clients: &mut ClientManager,
    ) {
        if self.slot_of(client_id).is_none() {
            debug!("Ignoring {:?} from unassigned client {}", message, client_id);
            return;
        }

        match message {
            ClientMessage::Increment { square } => {
                self.apply_move(client_id, square, clients);
            }
            ClientMessage::Restart => self.restart(client_id, clients),
        }
    }

    /// Increments one square on behalf of either player.
    ///
    /// Moves are not turn-gated. A move after the game has ended, or on a
    /// square outside 0..25, changes nothing and sends nothing. Returns
    /// whether the move was applied.
    pub fn apply_move(&mut self, client_id: ClientId, square: i64, clients: &mut ClientManager) -> bool {
        if self.game_over {
            debug!("Ignoring move on {} from client {}: game over", square, client_id);
            return false;
        }

        let Some((index, value)) = usize::try_from(square)
            .ok()
            .and_then(|index| self.board.increment(index).map(|value| (index, value)))
        else {
            debug!("Ignoring move on invalid square {} from client {}", square, client_id);
            return false;
        };

        debug!("Client {} moved: square {} -> {}", client_id, index, value);
        clients.broadcast(&ServerMessage::Update {
            square: index,
            value,
            board: self.board,
        });

        if let Some(result) = check_win(&self.board) {
            info!("{:?} wins with line {:?}", result.winner, result.line);
            self.game_over = true;
            self.winner = Some(result.winner.into());
            self.winning_line = Some(result.line);
            clients.broadcast(&ServerMessage::win(result));
        }

        true
    }

    /// Clears the board and outcome while keeping both slot bindings.
    /// Either player may restart.
    pub fn restart(&mut self, client_id: ClientId, clients: &mut ClientManager) {
        info!("Client {} restarted the game", client_id);
        self.clear_game();

        if self.both_slots_bound() {
            clients.broadcast(&self.game_start());
        }
    }

    /// Releases the slot held by a closed connection.
    ///
    /// Leaving an unfinished game ends it with the `DISCONNECT` outcome.
    /// Once both slots are empty the session starts over from scratch.
    /// Connections that never held a slot have no effect.
    pub fn disconnect(&mut self, client_id: ClientId, clients: &mut ClientManager) {
        let Some(player) = self.slot_of(client_id) else {
            debug!("Unassigned client {} left", client_id);
            return;
        };

        if !self.game_over {
            info!("{:?} player disconnected, ending game", player);
            self.game_over = true;
            self.winner = Some(Winner::Disconnect);
            self.winning_line = None;
            clients.broadcast(&ServerMessage::disconnect());
        }

        match player {
            Player::Odd => self.odd_player = None,
            Player::Even => self.even_player = None,
        }

        if self.odd_player.is_none() && self.even_player.is_none() {
            info!("All players left, resetting session");
            self.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio_tungstenite::tungstenite::Message;

    struct Harness {
        session: Session,
        clients: ClientManager,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                session: Session::new(),
                clients: ClientManager::new(),
            }
        }

        fn connect(&mut self, id: ClientId) -> UnboundedReceiver<Message> {
            let (tx, rx) = mpsc::unbounded_channel();
            let addr: SocketAddr = "127.0.0.1:9100".parse().unwrap();
            self.clients.add_client(id, addr, tx);
            self.session.join(id, &mut self.clients);
            rx
        }

        fn leave(&mut self, id: ClientId) {
            self.clients.remove_client(&id);
            self.session.disconnect(id, &mut self.clients);
        }

        fn increment(&mut self, id: ClientId, square: i64) {
            self.session.handle_message(
                id,
                ClientMessage::Increment { square },
                &mut self.clients,
            );
        }

        fn restart(&mut self, id: ClientId) {
            self.session
                .handle_message(id, ClientMessage::Restart, &mut self.clients);
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Message::Text(text) = frame {
                out.push(ServerMessage::from_json(&text).unwrap());
            }
        }
        out
    }

    fn started_pair() -> (Harness, UnboundedReceiver<Message>, UnboundedReceiver<Message>) {
        let mut h = Harness::new();
        let mut odd = h.connect(1);
        let mut even = h.connect(2);
        drain(&mut odd);
        drain(&mut even);
        (h, odd, even)
    }

    #[test]
    fn test_new_session_is_waiting() {
        let session = Session::new();
        assert_eq!(session.phase(), SessionPhase::WaitingForPlayers);
        assert!(session.board().is_empty());
        assert_eq!(session.winner(), None);
        assert_eq!(session.connection_of(Player::Odd), None);
        assert_eq!(session.connection_of(Player::Even), None);
    }

    #[test]
    fn test_first_join_gets_odd() {
        let mut h = Harness::new();
        let mut rx = h.connect(1);

        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::PlayerAssigned {
                player: Player::Odd,
                board: Board::new(),
            }]
        );
        assert_eq!(h.session.slot_of(1), Some(Player::Odd));
        assert_eq!(h.session.phase(), SessionPhase::WaitingForPlayers);
    }

    #[test]
    fn test_second_join_gets_even_and_starts_game() {
        let mut h = Harness::new();
        let mut odd = h.connect(1);
        let mut even = h.connect(2);

        let odd_msgs = drain(&mut odd);
        assert_eq!(odd_msgs.len(), 2);
        assert_eq!(
            odd_msgs[1],
            ServerMessage::GameStart {
                board: Board::new()
            }
        );

        assert_eq!(
            drain(&mut even),
            vec![
                ServerMessage::PlayerAssigned {
                    player: Player::Even,
                    board: Board::new(),
                },
                ServerMessage::GameStart {
                    board: Board::new()
                },
            ]
        );
        assert_eq!(h.session.phase(), SessionPhase::InProgress);
        assert_eq!(h.session.connection_of(Player::Even), Some(2));
    }

    #[test]
    fn test_third_join_is_rejected_and_closed() {
        let (mut h, mut odd, mut even) = started_pair();
        let mut third = h.connect(3);

        let mut frames = Vec::new();
        while let Ok(frame) = third.try_recv() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            Message::Text(text) => assert_eq!(
                ServerMessage::from_json(text).unwrap(),
                ServerMessage::Error {
                    message: FULL_GAME_MESSAGE.to_string()
                }
            ),
            other => panic!("Unexpected frame {:?}", other),
        }
        assert!(matches!(frames[1], Message::Close(None)));

        assert_eq!(h.session.slot_of(3), None);
        assert_eq!(h.session.connection_of(Player::Odd), Some(1));
        assert_eq!(h.session.connection_of(Player::Even), Some(2));
        assert!(drain(&mut odd).is_empty());
        assert!(drain(&mut even).is_empty());
    }

    #[test]
    fn test_move_broadcasts_update_to_both() {
        let (mut h, mut odd, mut even) = started_pair();
        h.increment(2, 7);

        let mut expected = Board::new();
        expected.increment(7);
        let update = ServerMessage::Update {
            square: 7,
            value: 1,
            board: expected,
        };
        assert_eq!(drain(&mut odd), vec![update.clone()]);
        assert_eq!(drain(&mut even), vec![update]);
    }

    #[test]
    fn test_moves_are_not_turn_gated() {
        let (mut h, _odd, _even) = started_pair();
        h.increment(1, 0);
        h.increment(1, 0);
        h.increment(1, 0);
        assert_eq!(h.session.board().get(0), Some(3));
    }

    #[test]
    fn test_out_of_range_move_is_silent() {
        let (mut h, mut odd, mut even) = started_pair();
        h.increment(1, 25);
        h.increment(1, -1);
        h.increment(2, i64::MAX);

        assert!(h.session.board().is_empty());
        assert!(drain(&mut odd).is_empty());
        assert!(drain(&mut even).is_empty());
    }

    #[test]
    fn test_move_from_unassigned_client_is_ignored() {
        let (mut h, mut odd, _even) = started_pair();
        let _third = h.connect(3);
        h.increment(3, 0);
        h.restart(3);

        assert!(h.session.board().is_empty());
        assert!(drain(&mut odd).is_empty());
    }

    #[test]
    fn test_winning_move_broadcasts_game_over_once() {
        let (mut h, mut odd, mut even) = started_pair();
        for square in 0..5 {
            h.increment(1, square);
        }

        let msgs = drain(&mut odd);
        assert_eq!(msgs.len(), 6);
        assert_eq!(
            msgs[5],
            ServerMessage::GameOver {
                winner: Winner::Odd,
                winning_line: Some([0, 1, 2, 3, 4]),
                message: None,
            }
        );
        assert_eq!(drain(&mut even).len(), 6);
        assert_eq!(h.session.phase(), SessionPhase::Finished);
        assert_eq!(h.session.winner(), Some(Winner::Odd));
        assert_eq!(h.session.winning_line(), Some([0, 1, 2, 3, 4]));
    }

    #[test]
    fn test_moves_after_game_over_are_ignored() {
        let (mut h, mut odd, mut even) = started_pair();
        for square in 0..5 {
            h.increment(1, square);
        }
        drain(&mut odd);
        drain(&mut even);
        let board = *h.session.board();

        h.increment(1, 10);
        h.increment(2, 0);

        assert_eq!(*h.session.board(), board);
        assert!(drain(&mut odd).is_empty());
        assert!(drain(&mut even).is_empty());
    }

    #[test]
    fn test_restart_clears_board_and_keeps_slots() {
        let (mut h, mut odd, mut even) = started_pair();
        for square in 0..5 {
            h.increment(1, square);
        }
        drain(&mut odd);
        drain(&mut even);

        h.restart(2);

        assert!(h.session.board().is_empty());
        assert_eq!(h.session.winner(), None);
        assert_eq!(h.session.winning_line(), None);
        assert_eq!(h.session.phase(), SessionPhase::InProgress);
        assert_eq!(h.session.connection_of(Player::Odd), Some(1));
        assert_eq!(h.session.connection_of(Player::Even), Some(2));
        let start = ServerMessage::GameStart {
            board: Board::new(),
        };
        assert_eq!(drain(&mut odd), vec![start.clone()]);
        assert_eq!(drain(&mut even), vec![start]);
    }

    #[test]
    fn test_restart_with_one_player_sends_nothing() {
        let mut h = Harness::new();
        let mut odd = h.connect(1);
        drain(&mut odd);
        h.increment(1, 4);
        drain(&mut odd);

        h.restart(1);

        assert!(h.session.board().is_empty());
        assert!(drain(&mut odd).is_empty());
    }

    #[test]
    fn test_disconnect_ends_game_for_remaining_player() {
        let (mut h, mut odd, _even) = started_pair();
        h.leave(2);

        assert_eq!(drain(&mut odd), vec![ServerMessage::disconnect()]);
        assert_eq!(h.session.phase(), SessionPhase::Finished);
        assert_eq!(h.session.winner(), Some(Winner::Disconnect));
        assert_eq!(h.session.connection_of(Player::Even), None);
        assert_eq!(h.session.connection_of(Player::Odd), Some(1));
    }

    #[test]
    fn test_disconnect_after_win_keeps_outcome() {
        let (mut h, mut odd, _even) = started_pair();
        for square in 0..5 {
            h.increment(1, square);
        }
        drain(&mut odd);

        h.leave(2);

        assert!(drain(&mut odd).is_empty());
        assert_eq!(h.session.winner(), Some(Winner::Odd));
    }

    #[test]
    fn test_last_disconnect_resets_session() {
        let (mut h, _odd, _even) = started_pair();
        h.increment(1, 3);
        h.leave(2);
        h.leave(1);

        assert_eq!(h.session.phase(), SessionPhase::WaitingForPlayers);
        assert!(h.session.board().is_empty());
        assert_eq!(h.session.winner(), None);

        let mut next = h.connect(9);
        assert_eq!(
            drain(&mut next),
            vec![ServerMessage::PlayerAssigned {
                player: Player::Odd,
                board: Board::new(),
            }]
        );
    }

    #[test]
    fn test_rejected_client_disconnect_has_no_effect() {
        let (mut h, mut odd, mut even) = started_pair();
        let _third = h.connect(3);
        h.leave(3);

        assert_eq!(h.session.phase(), SessionPhase::InProgress);
        assert!(drain(&mut odd).is_empty());
        assert!(drain(&mut even).is_empty());
    }

    #[test]
    fn test_replacement_even_player_gets_fresh_game() {
        let (mut h, mut odd, _even) = started_pair();
        h.increment(1, 12);
        h.leave(2);
        drain(&mut odd);

        let mut newcomer = h.connect(4);

        assert_eq!(h.session.phase(), SessionPhase::InProgress);
        assert!(h.session.board().is_empty());
        assert_eq!(
            drain(&mut newcomer),
            vec![
                ServerMessage::PlayerAssigned {
                    player: Player::Even,
                    board: Board::new(),
                },
                ServerMessage::GameStart {
                    board: Board::new()
                },
            ]
        );
        assert_eq!(
            drain(&mut odd),
            vec![ServerMessage::GameStart {
                board: Board::new()
            }]
        );
    }

    #[test]
    fn test_replacement_odd_player_waits_for_restart() {
        let (mut h, _odd, mut even) = started_pair();
        h.leave(1);
        drain(&mut even);

        let mut newcomer = h.connect(5);
        assert_eq!(h.session.slot_of(5), Some(Player::Odd));
        assert_eq!(drain(&mut newcomer).len(), 1);
        assert_eq!(h.session.phase(), SessionPhase::Finished);

        h.restart(2);
        assert_eq!(h.session.phase(), SessionPhase::InProgress);
        assert_eq!(drain(&mut newcomer).len(), 1);
        assert_eq!(drain(&mut even).len(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut h, _odd, _even) = started_pair();
        h.increment(1, 1);
        h.session.reset();

        assert_eq!(h.session.phase(), SessionPhase::WaitingForPlayers);
        assert!(h.session.board().is_empty());
        assert_eq!(h.session.slot_of(1), None);
        assert_eq!(h.session.slot_of(2), None);
    }
}
