use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use trace6::cli::Args;
use trace6::config::Config;
use trace6::probe::DatalinkTransport;
use trace6::trace::ProbeLoop;

fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Diagnostics go to stderr so stdout carries only the hop lines
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "trace6=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::from(args);

    let transport = DatalinkTransport::open(&config.interface).with_context(|| {
        format!(
            "Failed to open raw sockets on '{}' (requires CAP_NET_RAW or root)",
            config.interface
        )
    })?;

    let mut engine = ProbeLoop::new(config, transport, io::stdout().lock());
    let summary = engine.run(&args.target)?;

    tracing::debug!(
        "Trace to {} via {} finished after {} hops: {:?}",
        summary.destination,
        engine.transport().interface_name(),
        summary.last_hop().unwrap_or(0),
        summary.outcome
    );

    Ok(())
}
