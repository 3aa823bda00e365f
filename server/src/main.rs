use clap::{Parser, ValueEnum};
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_MAX_CLIENTS, DEFAULT_TICK_RATE};
use server::network::Server;
use shared::{ShipClass, ShipProfile, Tuning};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClassArg {
    Destroyer,
    Frigate,
    Corvette,
    Patrol,
    Transport,
}

impl From<ClassArg> for ShipClass {
    fn from(class: ClassArg) -> Self {
        match class {
            ClassArg::Destroyer => ShipClass::Destroyer,
            ClassArg::Frigate => ShipClass::Frigate,
            ClassArg::Corvette => ShipClass::Corvette,
            ClassArg::Patrol => ShipClass::Patrol,
            ClassArg::Transport => ShipClass::Transport,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum concurrent clients
    #[arg(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Built-in ship class for spawned vessels
    #[arg(short, long, value_enum, default_value = "frigate")]
    class: ClassArg,

    /// JSON ship profile; overrides --class
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Global speed multiplier (0.1 - 2.0)
    #[arg(short, long, default_value = "1.0")]
    speed_multiplier: f32,

    /// Seconds a disconnected client's vessel keeps sailing
    #[arg(long, default_value = "60")]
    orphan_linger: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let profile = match &args.profile {
        Some(path) => match ShipProfile::load(path) {
            Ok(profile) => Some(profile),
            Err(e) => {
                error!(
                    "Could not load ship profile {}: {}; vessels will spawn inert",
                    path.display(),
                    e
                );
                None
            }
        },
        None => Some(ShipProfile::preset(args.class.into())),
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let mut config = ServerConfig::new(addr);
    config.tick_rate = args.tick_rate;
    config.max_clients = args.max_clients;
    config.profile = profile;
    config.tuning = Tuning::new(args.speed_multiplier);
    config.orphan_linger = Duration::from_secs(args.orphan_linger);

    if let Some(profile) = &config.profile {
        info!(
            "Spawning {} ({:?}): {} kn max, turning radius {:.0} m",
            profile.name,
            profile.class,
            profile.max_speed,
            profile.min_turning_radius()
        );
    }

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
