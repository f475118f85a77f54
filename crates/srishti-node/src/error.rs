use thiserror::Error;

/// Errors surfaced by node lifecycle glue: identity/config loading, startup
/// wiring, and the main event loop. Per-block/per-event validation failures
/// stay inside `srishti-chain`/`srishti-state` as `CoreError`; this enum only
/// wraps the things that can go wrong *around* that ("fatal
/// conditions ... surface to node lifecycle glue, which halts initialisation
/// leaving state intact").
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("core error: {0}")]
    Core(#[from] srishti_core::CoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] srishti_crypto::CryptoError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid identity or config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid hex encoding: {0}")]
    Hex(String),

    #[error("no genesis present and this node was not told to bootstrap one (pass --genesis-params or --bootstrap)")]
    NoGenesisAndNoBootstrap,
}
