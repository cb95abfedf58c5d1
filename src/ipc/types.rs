use serde::Deserialize;

use crate::auth::Session;
use crate::clock::Clock;
use crate::config::Config;
use crate::workspace::Workspace;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub clock: Box<dyn Clock>,
    pub workspace: Option<Workspace>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new(config: Config) -> AppState {
        let clock = config.clock();
        AppState {
            config,
            clock,
            workspace: None,
            session: None,
        }
    }
}
