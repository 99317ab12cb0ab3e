pub mod config;
pub mod dial;
pub mod hardware;
pub mod network;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, IntakeMode};
use dial::{
    debounce::{EdgeGapFilter, ShiftRegisterFilter},
    decoder::DialDecoder,
    intake::{self, run_polling, DialConsumer},
    Clock,
};
use hardware::{DialHardware, Hardware};
use network::notifier::Notifier;

/// `RUST_LOG` wins over `LOG_LEVEL`, which wins over plain `info`.
fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;

    init_logging(config.log_level.as_deref());

    info!(
        intake = ?config.intake,
        sample_interval = ?config.decoder.sample_interval,
        min_pulse_gap = ?config.decoder.min_pulse_gap,
        max_pulse_gap = ?config.decoder.max_pulse_gap,
        completion_gap = ?config.decoder.completion_gap,
        notify = config.notify.is_some(),
        "starting rotary dial decoder"
    );

    let (mut notifier, notifier_handle) =
        Notifier::create(config.notify.as_ref(), config.queue_capacity)?;

    let notifier_task = tokio::spawn(async move {
        notifier.run().await;
    });

    let mut hardware = Hardware::create().context("failed to set up dial hardware")?;
    let indicator = hardware.take_indicator();

    let clock = Clock::start();
    let decoder = DialDecoder::new(&config.decoder);

    let mut dial_task = match config.intake {
        IntakeMode::Polling => {
            let (producer, receiver) = intake::channel(config.queue_capacity);
            let consumer = DialConsumer::new(
                ShiftRegisterFilter::new(&config.decoder),
                decoder,
                notifier_handle,
                indicator,
            );

            tokio::spawn(run_polling(
                hardware,
                producer,
                clock,
                config.decoder.sample_interval,
            ));

            tokio::spawn(async move {
                consumer.run(receiver, clock).await;
            })
        }
        IntakeMode::Interrupt => {
            let (producer, receiver) = intake::channel(config.queue_capacity);
            hardware
                .listen_edges(producer, clock)
                .context("failed to install edge listener")?;

            let consumer = DialConsumer::new(
                EdgeGapFilter::new(&config.decoder),
                decoder,
                notifier_handle,
                indicator,
            );

            tokio::spawn(async move {
                // The edge listener goes away with the hardware.
                let _hardware = hardware;
                consumer.run(receiver, clock).await;
            })
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("shutting down");
        }
        _ = &mut dial_task => {
            warn!("dial intake stopped");
        }
    }

    dial_task.abort();
    notifier_task.abort();

    Ok(())
}
