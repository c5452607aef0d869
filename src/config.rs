pub struct Config {
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3001),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { port: 3001 }
    }
}
