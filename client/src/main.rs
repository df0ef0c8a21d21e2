use clap::Parser;
use client::game::ClientGameState;
use client::network::{Client, Intent};
use rand::Rng;
use shared::config::GameConfig;
use shared::math::Vec2;
use shared::messages::GamePhase;

/// Headless demo driver: logs in, wanders the arena and fires during the
/// fight phase. Stands in for a rendering and input layer.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to connect to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Player id; random when omitted
    #[clap(short, long)]
    id: Option<String>,
    /// Display name
    #[clap(short, long, default_value = "bot")]
    name: String,
    /// Artificial latency in milliseconds added to each heartbeat
    #[clap(short, long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let player_id = args
        .id
        .unwrap_or_else(|| format!("bot-{}", rand::thread_rng().gen_range(1000..10000)));

    let mut state = ClientGameState::new(&player_id, &args.name, GameConfig::default());
    state.fake_latency = args.fake_ping as f32 / 1000.0;

    let addr = format!("{}:{}", args.host, args.port);
    let mut client = Client::connect(&addr, state).await?;

    let mut rng = rand::thread_rng();
    let mut direction = Vec2::ZERO;
    let mut next_turn = 0.0_f32;
    let mut next_shot = 0.0_f32;

    client
        .run(move |state| {
            let t = state.local_time();

            if t >= next_turn {
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                direction = Vec2::new(angle.cos(), angle.sin());
                next_turn = t + rng.gen_range(1.0..3.0);
            }

            let shoot = state.phase == GamePhase::Fight && t >= next_shot;
            if shoot {
                next_shot = t + rng.gen_range(0.5..2.0);
            }

            Intent { direction, shoot }
        })
        .await
}
