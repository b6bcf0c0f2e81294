use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Scope of the phase-advance mastery gate. `EntireList` requires every
/// active word of the assigned list to be correct for the current phase;
/// `Encountered` only checks words the learner has already attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceGate {
    EntireList,
    Encountered,
}

impl AdvanceGate {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entire-list" | "entire_list" | "list" => Some(AdvanceGate::EntireList),
            "encountered" => Some(AdvanceGate::Encountered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database_path: Option<PathBuf>,
    pub jwt_secret: String,
    pub advance_gate: AdvanceGate,
    pub composer_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let database_path = std::env::var("DATABASE_PATH").ok().map(PathBuf::from);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();

        let advance_gate = std::env::var("ADVANCE_GATE")
            .ok()
            .and_then(|value| AdvanceGate::parse(&value))
            .unwrap_or(AdvanceGate::EntireList);

        let composer_seed = std::env::var("COMPOSER_SEED")
            .ok()
            .and_then(|value| value.parse::<u64>().ok());

        Self {
            host,
            port,
            log_level,
            database_path,
            jwt_secret,
            advance_gate,
            composer_seed,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
