use causal_kv::{try_start_replica, ReplicaOptions, ReplicaStartConfig};
use clap::Parser;
use slog::Drain;

/// One replica of a causally consistent key-value store.
#[derive(Parser)]
#[command(name = "causal-kv")]
struct Args {
    /// host:port to listen on; also this replica's identity in the deployment
    #[arg(long)]
    listen: String,

    /// host:port of another replica; repeat once per peer
    #[arg(long = "peer")]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let logger = create_root_logger();

    let handle = match try_start_replica(ReplicaStartConfig {
        listen: args.listen,
        peers: args.peers,
        logger: logger.clone(),
        options: ReplicaOptions::default(),
    })
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        slog::error!(logger, "signal handler failed"; "error" => %e);
    }
    slog::info!(logger, "shutting down");
    drop(handle);
}

fn create_root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}
