pub mod commands;
pub mod config;
pub mod events;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod undo;
pub mod views;

#[cfg(feature = "app")]
pub mod stdio;

#[cfg(feature = "app")]
use crate::commands::open_state;
#[cfg(feature = "app")]
use crate::config::AppConfig;
#[cfg(feature = "app")]
use crate::scheduler::start_scheduler;
#[cfg(feature = "app")]
use crate::stdio::{serve, spawn_writer, StdioCtx};

#[cfg(feature = "app")]
pub fn run() -> std::process::ExitCode {
    use std::process::ExitCode;

    // Logging first, so config fallbacks below are recorded.
    #[cfg(not(test))]
    if let Err(err) = logging::init_logging(&config::data_dir_from_env()) {
        eprintln!("logging disabled: {err}");
    }
    let config = AppConfig::from_env();
    log::info!(
        "starting data_dir={} undo_ttl_ms={} tick={:?}",
        config.data_dir.display(),
        config.undo_ttl_ms,
        config.tick
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let writer = spawn_writer(rx);
        let ctx = StdioCtx::new(config.data_dir.clone(), tx);

        let state = match open_state(&ctx, config.undo_ttl_ms) {
            Ok(state) => state,
            Err(err) => {
                log::error!("failed to open data dir {}: {err}", config.data_dir.display());
                return ExitCode::FAILURE;
            }
        };

        let ticker = start_scheduler(ctx.clone(), state.clone(), config.tick);
        let served = serve(&ctx, &state).await;
        ticker.abort();

        drop(ctx);

        // Pending undo timers hold the output open until they fire.
        match writer.await {
            Ok(Err(err)) => log::warn!("stdout writer stopped: {err}"),
            Err(err) => log::warn!("stdout writer task failed: {err}"),
            Ok(Ok(())) => {}
        }

        match served {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                log::error!("stdin read failed: {err}");
                ExitCode::FAILURE
            }
        }
    })
}
