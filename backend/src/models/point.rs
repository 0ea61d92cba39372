// src/models/point.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'user_points' table: one running total per user.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserPoint {
    pub user_id: i64,
    pub points: i64,
    pub updated_at: DateTime<Utc>,
}
