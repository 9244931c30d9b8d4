use std::sync::Arc;

use crate::log::EventLog;
use crate::services::fanout::LiveFanout;
use crate::services::history_loader::HistoryLoader;
use crate::store::HistoryStore;

/// Shared state handed to every handler. Collaborators are injected behind
/// their traits so tests can swap in in-memory backends.
#[derive(Clone)]
pub struct AppState {
    pub log: Arc<dyn EventLog>,
    pub store: Arc<dyn HistoryStore>,
    pub fanout: Arc<LiveFanout>,
    pub loader: Arc<HistoryLoader>,
}

impl AppState {
    pub fn new(
        log: Arc<dyn EventLog>,
        store: Arc<dyn HistoryStore>,
        fanout: Arc<LiveFanout>,
    ) -> Self {
        let loader = Arc::new(HistoryLoader::new(store.clone()));
        Self {
            log,
            store,
            fanout,
            loader,
        }
    }
}
