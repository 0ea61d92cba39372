// src/services/pack_session.rs

use std::sync::Arc;

use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        page::Page,
        pack_session::{PackSession, PackSessionFilter},
    },
    store::PackSessionStore,
};

pub struct PackSessionService {
    store: Arc<dyn PackSessionStore>,
}

impl PackSessionService {
    pub fn new(store: Arc<dyn PackSessionStore>) -> Self {
        Self { store }
    }

    /// Starts a timed take of an active pack. Taking a pack that already has
    /// an open session returns that session unchanged.
    pub async fn take(&self, question_pack_id: i64, user_id: i64) -> Result<PackSession, AppError> {
        let pack = self.store.find_pack(question_pack_id).await?;
        if !pack.is_active {
            return Err(AppError::BadRequest("question pack is not active".to_string()));
        }

        let (session, created) = self.store.open_session(pack.id, user_id, Utc::now()).await?;
        if created {
            tracing::info!(question_pack_id, user_id, session_id = session.id, "Pack session started");
        }

        Ok(session)
    }

    pub async fn finish(&self, session_id: i64, user_id: i64) -> Result<PackSession, AppError> {
        let session = self.store.get(session_id).await?;
        if session.user_id != user_id {
            return Err(AppError::Forbidden(
                "You can only finish your own pack sessions".to_string(),
            ));
        }
        if session.is_finished {
            return Ok(session);
        }

        let finished = self.store.finish(session_id, Utc::now()).await?;
        tracing::info!(session_id, user_id, "Pack session finished");

        Ok(finished)
    }

    pub async fn list(&self, filter: PackSessionFilter) -> Result<Page<PackSession>, AppError> {
        let (data, total) = self.store.list(&filter).await?;
        Ok(Page::new(data, filter.page, total))
    }
}
