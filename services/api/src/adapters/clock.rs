//! services/api/src/adapters/clock.rs
//!
//! This module contains the adapter for the authoritative clock. It
//! implements the `ClockSource` port from the `core` crate by asking the
//! database for its clock, so a learner's machine time never reaches a
//! deadline decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cohort_core::ports::{ClockSource, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ClockSource` port using the database clock.
#[derive(Clone)]
pub struct DbClock {
    pool: PgPool,
}

impl DbClock {
    /// Creates a new `DbClock`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

//=========================================================================================
// `ClockSource` Trait Implementation
//=========================================================================================

#[async_trait]
impl ClockSource for DbClock {
    async fn now(&self) -> PortResult<DateTime<Utc>> {
        // An unreachable clock must surface as a hard failure; callers
        // never fall back to local time.
        sqlx::query_scalar::<_, DateTime<Utc>>("SELECT now()")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))
    }
}
