use std::net::SocketAddr;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MAX_MESSAGE_KIB: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RunMode {
    #[default]
    Dev,
    Production,
}

impl RunMode {
    pub fn default_log_filter(self) -> &'static str {
        match self {
            RunMode::Dev => "debug",
            RunMode::Production => "info",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub mode: RunMode,
    /// Larger websocket messages close the sending session.
    pub max_message_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            mode: RunMode::Dev,
            max_message_bytes: DEFAULT_MAX_MESSAGE_KIB * 1024,
        }
    }
}
