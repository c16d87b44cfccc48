use std::{process, sync::OnceLock, time::Duration};

use soilcast::{
    config::Config,
    core::{
        message::MessageBuilder,
        pipeline::Pipeline,
        queue::OfflineQueue,
        sensor::SysfsSensor,
        store::FileStore,
    },
    logger::LoggerManager,
    print_error,
};
use soilcast_mqtt::{MqttLink, RetryPolicy, RetryPublisher};
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config();
    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting soilcast version {}...", env!("CARGO_PKG_VERSION"));
    info!(
        "Device identity: farm '{}', device '{}'",
        cfg.device.farm_id, cfg.device.device_id
    );
    debug!("{:#?}", cfg.transport);

    let store = FileStore::open(&cfg.queue.path).unwrap_or_else(|e| {
        error!("Failed to open offline store: {e}");
        process::exit(1);
    });
    let queue = OfflineQueue::new(store, cfg.queue.capacity);

    let link = MqttLink::from_config(&cfg.transport, &cfg.device.farm_id, &cfg.device.device_id)
        .unwrap_or_else(|e| {
            error!("Failed to build MQTT link: {e}");
            process::exit(1);
        });
    info!(
        "MQTT link prepared (broker {}:{}, data topic '{}')",
        cfg.transport.host,
        cfg.transport.port,
        link.topics().data
    );
    let publisher = RetryPublisher::new(link, RetryPolicy::from_config(&cfg.transport));

    let sensor = SysfsSensor::new(cfg.sensors.clone(), cfg.calibration.clone());
    let builder = MessageBuilder::new(cfg.device.farm_id.clone(), cfg.device.device_id.clone());

    let pipeline = Pipeline::new(
        sensor,
        publisher,
        queue,
        builder,
        Duration::from_millis(cfg.pipeline.reading_interval_ms),
        Duration::from_millis(cfg.pipeline.service_interval_ms),
    );

    info!("Starting telemetry pipeline...");

    tokio::select! {
        _ = pipeline.run() => {
            error!("Pipeline unexpectedly finished");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C — shutting down");
        }
    }
    Ok(())
}
