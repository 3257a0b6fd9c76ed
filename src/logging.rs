use std::path::Path;

pub const LOG_FILE_BASENAME: &str = "taskflow";
pub const LOG_FILE_SUFFIX: &str = "log";
pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const LOG_ROTATE_KEEP_FILES: usize = 10;
pub const ENV_LOG_SPEC: &str = "TASKFLOW_LOG";

/// Log files sit next to the data blob.
pub fn log_directory(data_dir: &Path) -> &Path {
    data_dir
}

/// First non-blank value wins: `TASKFLOW_LOG`, then `RUST_LOG`, then the build default.
pub fn resolve_log_spec(lookup: impl Fn(&str) -> Option<String>) -> String {
    let default_spec = if cfg!(debug_assertions) {
        "warn,taskflow_lib=debug"
    } else {
        "warn,taskflow_lib=info"
    };
    [ENV_LOG_SPEC, "RUST_LOG"]
        .iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_spec.to_string())
}

#[cfg(all(feature = "app", not(test)))]
pub fn init_logging(data_dir: &Path) -> Result<(), flexi_logger::FlexiLoggerError> {
    use flexi_logger::{
        detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
    };

    std::fs::create_dir_all(data_dir)?;

    let spec = resolve_log_spec(|key| std::env::var(key).ok());

    // stdout carries the protocol; terminal echo goes to stderr only.
    Logger::try_with_str(spec)?
        .log_to_file(
            FileSpec::default()
                .directory(log_directory(data_dir))
                .basename(LOG_FILE_BASENAME)
                .suffix(LOG_FILE_SUFFIX),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .format_for_files(detailed_format)
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stdout(Duplicate::None)
        .duplicate_to_stderr(if cfg!(debug_assertions) {
            Duplicate::Info
        } else {
            Duplicate::None
        })
        .start()?;

    install_panic_hook();

    log::info!(
        "logger initialized dir={} rotate_size_bytes={} keep_files={}",
        log_directory(data_dir).display(),
        LOG_ROTATE_SIZE_BYTES,
        LOG_ROTATE_KEEP_FILES
    );
    Ok(())
}

#[cfg(all(feature = "app", not(test)))]
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info: &std::panic::PanicHookInfo<'_>| {
        let thread = std::thread::current();
        let location = info
            .location()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<unknown>".to_string());
        log::error!(
            "panic in thread {}: {} at {location}\n{}",
            thread.name().unwrap_or("<unnamed>"),
            panic_message(info.payload()),
            std::backtrace::Backtrace::force_capture()
        );
        previous(info);
    }));
}

#[cfg_attr(not(feature = "app"), allow(dead_code))]
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
