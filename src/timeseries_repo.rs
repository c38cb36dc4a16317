//! Append-only timeseries sink, bucketed by minute for index locality.

use anyhow::Result;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use tracing::info;

use crate::event::TimeseriesEvent;
use crate::schema::timeseries_events;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct TimeseriesRepository {
    pool: PgPool,
}

impl TimeseriesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_events<I>(&self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = TimeseriesEvent>,
    {
        let all: Vec<TimeseriesEvent> = events.into_iter().collect();
        let total = all.len();
        let mut inserted = 0;

        for batch in all.chunks(BATCH_SIZE) {
            let pool = self.pool.clone();
            let batch_vec = batch.to_vec();

            let count = tokio::task::spawn_blocking(move || {
                let mut conn = pool.get()?;
                diesel::insert_into(timeseries_events::table)
                    .values(&batch_vec)
                    .execute(&mut conn)
            })
            .await??;

            inserted += count;
        }

        if total > BATCH_SIZE {
            info!("inserted {inserted}/{total} timeseries_events rows");
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
        let _repo = TimeseriesRepository::new(test_pool());
    }
}
