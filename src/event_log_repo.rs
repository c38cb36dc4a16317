//! Append-only event-log sink.

use anyhow::Result;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use tracing::info;

use crate::event::IotEvent;
use crate::schema::event_log;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct EventLogRepository {
    pool: PgPool,
}

impl EventLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch of events, chunked to stay under the bind-parameter
    /// limit. Plain inserts, not upserts: each event is its own fact.
    pub async fn insert_events<I>(&self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = IotEvent>,
    {
        let all: Vec<IotEvent> = events.into_iter().collect();
        let total = all.len();
        let mut inserted = 0;

        for batch in all.chunks(BATCH_SIZE) {
            let pool = self.pool.clone();
            let batch_vec = batch.to_vec();

            let count = tokio::task::spawn_blocking(move || {
                let mut conn = pool.get()?;
                diesel::insert_into(event_log::table)
                    .values(&batch_vec)
                    .execute(&mut conn)
            })
            .await??;

            inserted += count;
        }

        if total > BATCH_SIZE {
            info!("inserted {inserted}/{total} event_log rows");
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> PgPool {
        let manager = ConnectionManager::<PgConnection>::new("postgres://unused/unused");
        Pool::builder().max_size(1).min_idle(Some(0)).build_unchecked(manager)
    }

    #[test]
    fn repository_can_be_constructed_without_connecting() {
        let _repo = EventLogRepository::new(test_pool());
    }
}
