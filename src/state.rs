use crate::config::Config;
use crate::stats::StatsService;

pub struct AppState {
    pub config: Config,
    pub stats: StatsService,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let stats = StatsService::from_config(&config);
        Self { config, stats }
    }
}
