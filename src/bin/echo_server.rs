//! Echo server over the framing protocol.
//!
//! Binds the dispatcher on the configured address and writes every received
//! message straight back to its sender. Ctrl-C drains and stops.

use framewire::config::NetworkConfig;
use framewire::utils::{logging, timeout::with_timeout};
use framewire::{Dispatcher, Handler};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> framewire::Result<()> {
    let config = NetworkConfig::from_env()?;
    config.validate_strict()?;
    logging::init(&config.logging);

    let handler = Handler::new().on_message(|reply, msg| {
        let _ = reply.write(msg);
    });

    let mut server = Dispatcher::new(config.server.clone(), handler);
    server.start().await?;
    info!(
        address = ?server.local_addr(),
        workers = server.pool_size(),
        "echo server running, ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;

    if with_timeout(config.server.shutdown_timeout, server.stop())
        .await
        .is_err()
    {
        warn!("shutdown drain exceeded its deadline, exiting anyway");
    }
    Ok(())
}
