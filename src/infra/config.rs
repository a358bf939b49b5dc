//! Centralized configuration (environment variables + defaults).

use std::time::Duration;

/// Database URL must be provided (no default) for safety.
pub fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set")
}

/// Connection pool size.
pub fn max_connections() -> u32 {
    std::env::var("MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(5)
}

/// Base URL of the external authorization collaborator (required).
pub fn authz_base_url() -> String {
    std::env::var("AUTHZ_BASE_URL").expect("AUTHZ_BASE_URL must be set")
}

/// Timeout for a single authorization collaborator call.
pub fn authz_timeout() -> Duration {
    let ms = std::env::var("AUTHZ_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(5_000);
    Duration::from_millis(ms.max(1))
}

/// Number of child rows copied per sub-transaction during a deep copy.
pub fn copy_chunk_size() -> usize {
    std::env::var("COPY_CHUNK_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(64)
        .max(1)
}

/// Listen address for the API server.
pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}
