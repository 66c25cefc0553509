use clap::Parser;
use client::game::ClientGameState;
use client::input::{InputAction, InputManager};
use client::network::{ChaosMode, NetworkClient};
use client::rendering::Renderer;
use env_logger::Env;
use log::info;
use macroquad::prelude::*;
use macroquad::window::Conf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL to connect to
    #[arg(short = 's', long, env = "SERVER_URL", default_value = "ws://127.0.0.1:8081")]
    server: String,

    /// Start with chaos mode enabled
    #[arg(short = 'c', long)]
    chaos: bool,

    /// Maximum chaos delay in milliseconds (0-2000)
    #[arg(short = 'd', long, default_value_t = 500)]
    max_delay: u64,

    /// Window width
    #[arg(short = 'w', long, default_value_t = 640)]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value_t = 800)]
    height: i32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Odd/Even Tic-Tac-Toe".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    info!("Controls: click a square to increment, R to restart, C to toggle chaos mode");

    let network = NetworkClient::connect(&args.server);
    let mut chaos = ChaosMode::new(args.chaos, args.max_delay);
    let mut state = ClientGameState::new();
    let mut input = InputManager::new();
    let renderer = Renderer::new();
    let mut rng = ::rand::thread_rng();

    loop {
        for event in network.poll_events() {
            state.apply_event(event);
        }

        for action in input.update(&renderer.layout()) {
            match action {
                InputAction::Increment(square) => {
                    if let Some(message) = state.click(square) {
                        network.send(message, chaos.sample_delay(&mut rng));
                    }
                }
                InputAction::Restart => {
                    if let Some(message) = state.request_restart() {
                        network.send(message, chaos.sample_delay(&mut rng));
                    }
                }
                InputAction::ToggleChaos => chaos.toggle(),
                InputAction::AdjustChaosDelay(delta) => chaos.adjust(delta),
            }
        }

        renderer.render(&state, &chaos);
        next_frame().await;
    }
}
