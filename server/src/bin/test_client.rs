use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use shared::{ClientMessage, ServerMessage, Winner, CELL_COUNT};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Headless player that joins, fires random increments and prints what the
/// server sends back
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL
    #[arg(short, long, env = "SERVER_URL", default_value = "ws://127.0.0.1:8081")]
    server: String,

    /// Number of increments to send once the game starts
    #[arg(short, long, default_value_t = 50)]
    moves: usize,

    /// Upper bound of the random delay added to each message, in milliseconds
    #[arg(short = 'd', long, default_value_t = 0)]
    max_delay: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut sink, mut source) = ws_stream.split();

    // Every delayed send funnels through one writer so the sink has a single owner.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut moves_sent = false;

    loop {
        let frame = match timeout(Duration::from_secs(10), source.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                println!("Connection error: {}", e);
                break;
            }
            Ok(None) => {
                println!("Server closed the connection");
                break;
            }
            Err(_) => {
                println!("No message for 10s, giving up");
                break;
            }
        };

        let Message::Text(text) = frame else {
            continue;
        };

        let message = match ServerMessage::from_json(&text) {
            Ok(message) => message,
            Err(e) => {
                println!("Undecodable message {:?}: {}", text, e);
                continue;
            }
        };

        match message {
            ServerMessage::PlayerAssigned { player, .. } => {
                println!("Assigned to {:?}, waiting for an opponent", player);
            }
            ServerMessage::GameStart { .. } => {
                println!("Game started");
                if !moves_sent {
                    moves_sent = true;
                    send_random_moves(&out_tx, args.moves, args.max_delay);
                }
            }
            ServerMessage::Update { square, value, .. } => {
                println!("Square {} is now {}", square, value);
            }
            ServerMessage::GameOver {
                winner,
                winning_line,
                ..
            } => {
                match winner {
                    Winner::Disconnect => println!("Opponent disconnected"),
                    _ => println!("{:?} wins with {:?}", winner, winning_line),
                }
                break;
            }
            ServerMessage::Error { message } => {
                println!("Rejected: {}", message);
                break;
            }
        }
    }

    writer.abort();
    Ok(())
}

fn send_random_moves(out_tx: &mpsc::UnboundedSender<String>, moves: usize, max_delay: u64) {
    let mut rng = rand::thread_rng();

    for _ in 0..moves {
        let square = rng.gen_range(0..CELL_COUNT) as i64;
        let delay = if max_delay > 0 {
            rng.gen_range(0..=max_delay)
        } else {
            0
        };
        let Ok(text) = (ClientMessage::Increment { square }).to_json() else {
            continue;
        };

        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(delay)).await;
            let _ = out_tx.send(text);
        });
    }
}
