use relay_runner::{RelayConfig, ShutdownCoordinator, load_config, load_default_config, run_chat};
use relay_transport::{ChannelTransport, Transport};
use std::sync::Arc;

fn load() -> anyhow::Result<RelayConfig> {
    let config = match std::env::var("RELAY_CONFIG") {
        Ok(path) => {
            log::info!("Loading config from {}", path);
            load_config(&path)?
        }
        Err(_) => load_default_config()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load()?;
    log::info!("Starting relay chat on {}", config.chat.topic);

    let transport: Arc<dyn Transport> =
        Arc::new(ChannelTransport::new(config.transport.channel.clone()));

    // Registered before any loop starts
    let coordinator = ShutdownCoordinator::install(transport, config.shutdown.clone())?;
    log::info!("Press Ctrl-C to stop");

    let summary = run_chat(&config, coordinator).await?;

    if let Some(producer) = summary.producer {
        log::info!(
            "Producer: sent={} failed={} ({:?})",
            producer.sent,
            producer.failed,
            producer.stop
        );
    }
    if let Some(consumer) = summary.consumer {
        log::info!(
            "Consumer: handled={} decode_failures={} handler_failures={} ({:?})",
            consumer.handled,
            consumer.decode_failures,
            consumer.handler_failures,
            consumer.reason
        );
    }
    log::info!("Shutdown confirmed ({:?})", summary.shutdown.trigger);

    Ok(())
}
