use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use seat_alloc::{global_queue, Config, Engine, Error, Fleet, Reactor};
use tracing::{error, info};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seat_alloc=info".into()),
        )
        .init();

    let config = Config::parse();
    if let Err(e) = run(config) {
        error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

fn run(config: Config) -> seat_alloc::Result<()> {
    config.validate()?;
    info!(
        segments = config.segments,
        trains = config.trains,
        seats = config.seats,
        session_queue = config.session_queue_capacity(),
        global_queue = config.global_queue_capacity(),
        "configuration loaded"
    );

    info!(tickets = config.arena_capacity(), "building fleet");
    let mut engine = Engine::new(Fleet::new(config.segments, config.trains, config.seats));
    engine.warm_up();

    let (producer, consumer) = global_queue(config.global_queue_capacity());
    let shutdown = Arc::new(AtomicBool::new(false));

    let allocator = engine
        .spawn(consumer, shutdown.clone(), config.pin_core)
        .map_err(|e| Error::Thread(format!("failed to spawn allocator: {e}")))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;

    let result = runtime.block_on(async {
        let mut reactor = Reactor::bind(&config, producer, shutdown.clone()).await?;

        let flag = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                flag.store(true, Ordering::Release);
            }
        });

        reactor.run().await
    });

    shutdown.store(true, Ordering::Release);
    let engine = allocator
        .join()
        .map_err(|_| Error::Thread("allocator thread panicked".into()))?;
    info!(processed = engine.processed(), "allocator joined");

    result
}
