//! Structured logging bootstrap.
//!
//! A library should not install a global subscriber on its own — only the
//! binary that owns `main` should call this, the same division the teacher
//! keeps between `codescope-server` (a library with `tracing::debug!`/`info!`
//! call sites throughout) and `codescope-server/src/main.rs` (the only place
//! that calls `tracing_subscriber::fmt()...init()`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codesift=info")),
        )
        .with_target(false)
        .try_init();
}
