use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use log::info;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use call_signal_server::env::Env;
use call_signal_server::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Env::load().context("invalid CALL_SIGNAL_* environment")?;
    TermLogger::init(
        settings.log_level()?,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let address = match env::args().nth(1) {
        Some(address) => address
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid ip address provided: {address}"))?,
        None => settings.address,
    };

    let app = router::create_router();
    info!("document store listening on {}", address);
    axum::Server::bind(&address)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
