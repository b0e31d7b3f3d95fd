use clap::Parser;
use greeter::{config::Config, server, BoxError};
use tracing::Level;
use tracing_subscriber::{filter::Targets, prelude::*};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::parse();

    let layer = tracing_subscriber::fmt::layer().with_filter(
        Targets::default()
            .with_target("hyper", Level::ERROR)
            .with_default(config.log_level),
    );
    tracing_subscriber::registry().with(layer).init();

    server::run(config).await
}
