//! Immediate-mode drawing of the grid, status lines and chaos controls

use crate::game::ClientGameState;
use crate::network::ChaosMode;
use macroquad::prelude::*;
use shared::{Board, BOARD_SIZE, CELL_COUNT};

const HEADER_HEIGHT: f32 = 110.0;
const FOOTER_HEIGHT: f32 = 90.0;
const CELL_GAP: f32 = 6.0;

/// Screen placement of the 5x5 grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    pub origin_x: f32,
    pub origin_y: f32,
    pub cell_size: f32,
    pub gap: f32,
}

impl BoardLayout {
    /// Largest square grid that fits between the header and footer, centered
    pub fn fit(width: f32, height: f32) -> Self {
        let available = (width - 40.0)
            .min(height - HEADER_HEIGHT - FOOTER_HEIGHT)
            .max(BOARD_SIZE as f32 * 10.0);
        let cell_size = (available - CELL_GAP * (BOARD_SIZE as f32 - 1.0)) / BOARD_SIZE as f32;
        let span = cell_size * BOARD_SIZE as f32 + CELL_GAP * (BOARD_SIZE as f32 - 1.0);

        Self {
            origin_x: (width - span) / 2.0,
            origin_y: HEADER_HEIGHT,
            cell_size,
            gap: CELL_GAP,
        }
    }

    pub fn cell_origin(&self, index: usize) -> (f32, f32) {
        let row = index / BOARD_SIZE;
        let col = index % BOARD_SIZE;
        let stride = self.cell_size + self.gap;
        (
            self.origin_x + col as f32 * stride,
            self.origin_y + row as f32 * stride,
        )
    }

    /// Square under a screen point. Points in the gaps hit nothing.
    pub fn square_at(&self, x: f32, y: f32) -> Option<usize> {
        let stride = self.cell_size + self.gap;
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        if dx < 0.0 || dy < 0.0 {
            return None;
        }

        let col = (dx / stride) as usize;
        let row = (dy / stride) as usize;
        if dx - col as f32 * stride > self.cell_size || dy - row as f32 * stride > self.cell_size {
            return None;
        }

        Board::index_of(row, col)
    }

    pub fn bottom(&self) -> f32 {
        self.origin_y + self.cell_size * BOARD_SIZE as f32 + self.gap * (BOARD_SIZE as f32 - 1.0)
    }
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn layout(&self) -> BoardLayout {
        BoardLayout::fit(screen_width(), screen_height())
    }

    pub fn render(&self, state: &ClientGameState, chaos: &ChaosMode) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let layout = self.layout();
        self.draw_header(state);
        self.draw_board(state, &layout);
        self.draw_footer(state, chaos, &layout);
    }

    fn draw_header(&self, state: &ClientGameState) {
        draw_text("Odd/Even Tic-Tac-Toe", 20.0, 32.0, 32.0, WHITE);
        draw_text(&state.player_line(), 20.0, 60.0, 22.0, LIGHTGRAY);
        draw_text(&state.status_line(), 20.0, 84.0, 22.0, YELLOW);
        if let Some(hint) = state.hint_line() {
            draw_text(hint, 20.0, 102.0, 16.0, GRAY);
        }
    }

    fn draw_board(&self, state: &ClientGameState, layout: &BoardLayout) {
        let highlighted = state.highlighted_line();

        for index in 0..CELL_COUNT {
            let value = state.board.get(index).unwrap_or(0);
            let (x, y) = layout.cell_origin(index);
            let size = layout.cell_size;

            draw_rectangle(x, y, size, size, cell_color(value));

            if highlighted.is_some_and(|line| line.contains(&index)) {
                draw_rectangle_lines(x, y, size, size, 6.0, GOLD);
            } else if state.pending_squares.contains(&index) {
                draw_rectangle_lines(x, y, size, size, 3.0, YELLOW);
            } else {
                draw_rectangle_lines(x, y, size, size, 1.0, WHITE);
            }

            let label = value.to_string();
            let font_size = size * 0.45;
            let dims = measure_text(&label, None, font_size as u16, 1.0);
            draw_text(
                &label,
                x + (size - dims.width) / 2.0,
                y + (size + dims.offset_y) / 2.0,
                font_size,
                WHITE,
            );
        }
    }

    fn draw_footer(&self, state: &ClientGameState, chaos: &ChaosMode, layout: &BoardLayout) {
        let y = layout.bottom() + 30.0;

        let chaos_text = if chaos.enabled {
            format!("Chaos Mode ON - delays 0-{}ms (C toggle, Up/Down adjust)", chaos.max_delay_ms)
        } else {
            "Chaos Mode OFF (C to toggle)".to_string()
        };
        let chaos_color = if chaos.enabled { ORANGE } else { GRAY };
        draw_text(&chaos_text, 20.0, y, 18.0, chaos_color);

        if state.is_finished() {
            draw_text("Press R to start a new game", 20.0, y + 26.0, 22.0, GREEN);
        } else if state.can_play() {
            draw_text("Click any square to increment by 1", 20.0, y + 26.0, 18.0, LIGHTGRAY);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_color(value: u32) -> Color {
    if value == 0 {
        Color::from_rgba(68, 68, 68, 255)
    } else if value % 2 == 1 {
        Color::from_rgba(255, 68, 68, 255)
    } else {
        Color::from_rgba(0, 120, 255, 255)
    }
}
