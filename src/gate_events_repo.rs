//! Gate-crossing events (entry/exit at a terminal, depot, or rail ramp),
//! stored separately from general IoT events since they key off a geofence.

use anyhow::Result;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use tracing::info;

use crate::event::GateEvent;
use crate::schema::gate_events;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct GateEventsRepository {
    pool: PgPool,
}

impl GateEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_events<I>(&self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = GateEvent>,
    {
        let all: Vec<GateEvent> = events.into_iter().collect();
        let total = all.len();
        let mut inserted = 0;

        for batch in all.chunks(BATCH_SIZE) {
            let pool = self.pool.clone();
            let batch_vec = batch.to_vec();

            let count = tokio::task::spawn_blocking(move || {
                let mut conn = pool.get()?;
                diesel::insert_into(gate_events::table)
                    .values(&batch_vec)
                    .execute(&mut conn)
            })
            .await??;

            inserted += count;
        }

        if total > BATCH_SIZE {
            info!("inserted {inserted}/{total} gate_events rows");
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
        let _repo = GateEventsRepository::new(test_pool());
    }
}
