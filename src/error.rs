//! Error types for the stressload crate.
use thiserror::Error;

/// Rejections raised while validating a run configuration, before any
/// request is issued.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duration must be at least one second")]
    ZeroDuration,

    #[error("clients must be at least 1")]
    ZeroClients,

    #[error("at least one target URL is required")]
    NoUrls,

    #[error("request timeout must be at least one second")]
    ZeroTimeout,

    #[error("at least one runtime thread is required")]
    ZeroThreads,
}

/// Failures setting up the engine itself. Individual requests never surface
/// here, they are absorbed into the statistics store.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to build TLS connector: {0}")]
    Tls(#[from] tokio_native_tls::native_tls::Error),
}
