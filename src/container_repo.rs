//! Container persistence: batched upsert of the full population plus the
//! single-row update each scheduler tick performs, grounded on the same
//! chunked on-conflict pattern used for static reference data elsewhere.

use anyhow::Result;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::upsert::excluded;
use tracing::info;

use crate::container::Container;
use crate::schema::containers;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct ContainerRepository {
    pool: PgPool,
}

impl ContainerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a batch of containers keyed on `container_id`, chunked to stay
    /// under PostgreSQL's bind-parameter limit.
    pub async fn upsert_containers<I>(&self, containers_iter: I) -> Result<usize>
    where
        I: IntoIterator<Item = Container>,
    {
        use crate::schema::containers::dsl::*;

        let all: Vec<Container> = containers_iter.into_iter().collect();
        let total = all.len();
        let mut total_upserted = 0;

        for batch in all.chunks(BATCH_SIZE) {
            let pool = self.pool.clone();
            let batch_vec = batch.to_vec();

            let upserted = tokio::task::spawn_blocking(move || {
                let mut conn = pool.get()?;
                let count = diesel::insert_into(containers)
                    .values(&batch_vec)
                    .on_conflict(container_id)
                    .do_update()
                    .set((
                        tracker_id.eq(excluded(tracker_id)),
                        asset_id.eq(excluded(asset_id)),
                        container_type.eq(excluded(container_type)),
                        refrigerated.eq(excluded(refrigerated)),
                        cargo_type.eq(excluded(cargo_type)),
                        state.eq(excluded(state)),
                        report_slot.eq(excluded(report_slot)),
                        latitude.eq(excluded(latitude)),
                        longitude.eq(excluded(longitude)),
                        is_moving.eq(excluded(is_moving)),
                        door_open.eq(excluded(door_open)),
                        current_geofence.eq(excluded(current_geofence)),
                        use_rail.eq(excluded(use_rail)),
                        origin_depot.eq(excluded(origin_depot)),
                        origin_rail_ramp.eq(excluded(origin_rail_ramp)),
                        origin_terminal.eq(excluded(origin_terminal)),
                        destination_terminal.eq(excluded(destination_terminal)),
                        destination_rail_ramp.eq(excluded(destination_rail_ramp)),
                        destination_depot.eq(excluded(destination_depot)),
                        last_event_time.eq(excluded(last_event_time)),
                        updated_at.eq(excluded(updated_at)),
                    ))
                    .execute(&mut conn)?;
                Ok::<usize, anyhow::Error>(count)
            })
            .await??;

            total_upserted += upserted;
        }

        info!("upserted {total_upserted}/{total} containers");
        Ok(total_upserted)
    }

    /// The full persisted population, used to rebuild runtimes on resume.
    pub async fn load_all(&self) -> Result<Vec<Container>> {
        use crate::schema::containers::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            containers.select(Container::as_select()).load(&mut conn)
        })
        .await??;
        Ok(rows)
    }

    /// Containers due to be processed in `slot` this tick.
    pub async fn load_slot(&self, slot: i32) -> Result<Vec<Container>> {
        use crate::schema::containers::dsl::*;

        let pool = self.pool.clone();
        let rows = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            containers
                .filter(report_slot.eq(slot))
                .select(Container::as_select())
                .load(&mut conn)
        })
        .await??;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64> {
        use crate::schema::containers::dsl::*;

        let pool = self.pool.clone();
        let n = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            containers.count().get_result::<i64>(&mut conn)
        })
        .await??;
        Ok(n)
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
        let _repo = ContainerRepository::new(test_pool());
    }
}
