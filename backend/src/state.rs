use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{attempt::AttemptService, pack_session::PackSessionService},
    store::PointLedger,
};

#[derive(Clone)]
pub struct AppState {
    pub attempts: Arc<AttemptService>,
    pub packs: Arc<PackSessionService>,
    pub points: Arc<dyn PointLedger>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<AttemptService> {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for Arc<PackSessionService> {
    fn from_ref(state: &AppState) -> Self {
        state.packs.clone()
    }
}

impl FromRef<AppState> for Arc<dyn PointLedger> {
    fn from_ref(state: &AppState) -> Self {
        state.points.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
