//! Mouse and keyboard handling turned into game actions

use crate::network::ChaosMode;
use crate::rendering::BoardLayout;
use macroquad::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Increment(usize),
    Restart,
    ToggleChaos,
    AdjustChaosDelay(i64),
}

/// Collects the actions triggered this frame
pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        InputManager
    }

    pub fn update(&mut self, layout: &BoardLayout) -> Vec<InputAction> {
        let mut actions = Vec::new();

        if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = mouse_position();
            if let Some(square) = layout.square_at(x, y) {
                actions.push(InputAction::Increment(square));
            }
        }

        let pressed: Vec<KeyCode> = [
            KeyCode::R,
            KeyCode::C,
            KeyCode::Up,
            KeyCode::Equal,
            KeyCode::Down,
            KeyCode::Minus,
        ]
        .into_iter()
        .filter(|&key| is_key_pressed(key))
        .collect();

        actions.extend(pressed.into_iter().filter_map(action_for_key));
        actions
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

fn action_for_key(key: KeyCode) -> Option<InputAction> {
    match key {
        KeyCode::R => Some(InputAction::Restart),
        KeyCode::C => Some(InputAction::ToggleChaos),
        KeyCode::Up | KeyCode::Equal => {
            Some(InputAction::AdjustChaosDelay(ChaosMode::DELAY_STEP_MS))
        }
        KeyCode::Down | KeyCode::Minus => {
            Some(InputAction::AdjustChaosDelay(-ChaosMode::DELAY_STEP_MS))
        }
        _ => None,
    }
}
