use kboard::cli::run;
use kboard::error::BoardError;

/// Database and I/O failures are internal (exit 2); everything else is the
/// operator's to fix (exit 1).
fn is_internal(e: &anyhow::Error) -> bool {
    if e.downcast_ref::<BoardError>().is_some() {
        return false;
    }
    if e.chain().any(|cause| cause.is::<rusqlite::Error>() || cause.is::<std::io::Error>()) {
        return true;
    }
    let error_str = e.to_string();
    error_str.contains("database") || error_str.contains("constraint") ||
        error_str.contains("SQLite") || error_str.contains("Failed to")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    #[cfg(windows)]
    let _ = enable_ansi_support::enable_ansi_support();

    if let Err(e) = run() {
        if is_internal(&e) {
            eprintln!("Internal error: {}", e);
            // Show error chain if available
            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut indent = 1;
                while let Some(err) = source {
                    eprintln!("{:indent$}  {}", "", err);
                    source = err.source();
                    indent += 1;
                }
            }
            std::process::exit(2);
        } else {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
