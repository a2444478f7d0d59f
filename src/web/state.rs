use crate::{Config, events::SharedEventBus, model::ModelManager};

#[derive(Debug, Clone)]
pub struct AppState {
    mm: ModelManager,
    events: SharedEventBus,
    config: &'static Config,
}

impl AppState {
    pub fn new(mm: ModelManager, events: SharedEventBus, config: &'static Config) -> Self {
        Self { mm, events, config }
    }

    pub fn pool(&self) -> &ModelManager {
        &self.mm
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn config(&self) -> &'static Config {
        self.config
    }
}
