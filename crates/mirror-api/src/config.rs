use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_cors")]
    pub cors_enabled: bool,

    /// Levels per side when `depth` is not given
    #[serde(default = "default_depth")]
    pub default_depth: usize,

    /// Upper bound for a requested `depth`
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors() -> bool {
    true
}

fn default_depth() -> usize {
    10
}

fn default_max_depth() -> usize {
    500
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| default_host()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_port),
            cors_enabled: std::env::var("API_CORS_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_cors),
            default_depth: default_depth(),
            max_depth: std::env::var("API_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_depth),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_cors(),
            default_depth: default_depth(),
            max_depth: default_max_depth(),
        }
    }
}
