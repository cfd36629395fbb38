pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const BINARY_NAME: &str = env!("CARGO_BIN_NAME");

/// Variables read by the client, shown by `fusion info`
pub const ENV_VARS: &[&str] = &[
    "FUSION_API_KEY",
    "FUSION_BASE_URL",
    "FUSION_TIMEOUT",
    "FUSION_MAX_RETRIES",
    "FUSION_CACHE_ENABLED",
    "FUSION_CACHE_TTL",
    "FUSION_CACHE_MAX_SIZE",
    "FUSION_RATE_LIMIT_CALLS",
    "FUSION_RATE_LIMIT_WINDOW",
];

/// Tokens the network side may read ahead of the terminal
pub const STREAM_BUFFER_SIZE: usize = 64;
