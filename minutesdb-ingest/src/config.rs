use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Default archive feeds, one JSON array of meeting summaries per year.
pub const DEFAULT_SOURCES: [&str; 4] = [
    "https://raw.githubusercontent.com/SingularityNET-Archive/SingularityNET-Archive/refs/heads/main/Data/Snet-Ambassador-Program/Meeting-Summaries/2025/meeting-summaries-array.json",
    "https://raw.githubusercontent.com/SingularityNET-Archive/SingularityNET-Archive/refs/heads/main/Data/Snet-Ambassador-Program/Meeting-Summaries/2024/meeting-summaries-array.json",
    "https://raw.githubusercontent.com/SingularityNET-Archive/SingularityNET-Archive/refs/heads/main/Data/Snet-Ambassador-Program/Meeting-Summaries/2023/meeting-summaries-array.json",
    "https://raw.githubusercontent.com/SingularityNET-Archive/SingularityNET-Archive/refs/heads/main/Data/Snet-Ambassador-Program/Meeting-Summaries/2022/meeting-summaries-array.json",
];

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct IngestConfig {
    pub sources: Vec<String>,
    pub fetch_timeout_seconds: u64,
    pub progress_interval: usize,
    pub dry_run: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            fetch_timeout_seconds: 30,
            progress_interval: 10,
            dry_run: false,
        }
    }
}

impl IngestConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("MINUTESDB.toml"))
            .merge(Env::prefixed("MINUTESDB_"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}
