//! Geofence store: bootstrap-time spatial queries backed by PostGIS, with an
//! in-process read-through cache since the set is read-only after bootstrap.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use dashmap::DashMap;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types;
use tracing::{info, warn};
use uuid::Uuid;

use crate::geofence::{Geofence, GeofenceType};
use crate::geometry::LonLat;
use crate::postgis_functions::st_contains;
use crate::schema::geofences;

type PgPool = Pool<ConnectionManager<PgConnection>>;

/// A polygon feature to upsert, as GeoJSON-style ring coordinates.
pub struct NewGeofence {
    pub name: String,
    pub type_id: GeofenceType,
    pub un_locode: Option<String>,
    pub smdg_code: Option<String>,
    pub description: Option<String>,
    /// Exterior ring as (lon, lat) pairs, first point repeated as last.
    pub ring: Vec<LonLat>,
}

#[derive(Clone)]
pub struct GeofenceStore {
    pool: PgPool,
    by_name: Arc<DashMap<String, Arc<Geofence>>>,
    by_type: Arc<DashMap<GeofenceType, Vec<Arc<Geofence>>>>,
}

impl GeofenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            by_name: Arc::new(DashMap::new()),
            by_type: Arc::new(DashMap::new()),
        }
    }

    /// Fail loudly if the GiST index on `geofences.geometry` or the unique
    /// index on `geofences.name` is absent. Without the GiST index,
    /// `find_containing` silently degrades to a sequential scan under load.
    pub async fn verify_indexes(&self) -> Result<()> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            #[derive(QueryableByName)]
            struct IndexRow {
                #[diesel(sql_type = sql_types::Text)]
                indexdef: String,
            }

            let rows: Vec<IndexRow> = diesel::sql_query(
                "SELECT indexdef FROM pg_indexes WHERE tablename = 'geofences'",
            )
            .load(&mut conn)
            .context("failed to read pg_indexes for geofences")?;

            let has_gist = rows.iter().any(|r| r.indexdef.contains("USING gist"));
            let has_unique_name = rows
                .iter()
                .any(|r| r.indexdef.contains("UNIQUE") && r.indexdef.contains("(name)"));

            if !has_gist {
                bail!("missing required GiST index on geofences.geometry");
            }
            if !has_unique_name {
                bail!("missing required unique index on geofences.name");
            }

            Ok(())
        })
        .await?
    }

    /// Load every geofence row (minus geometry) into the in-process cache.
    pub async fn reload(&self) -> Result<usize> {
        let pool = self.pool.clone();

        let rows: Vec<Geofence> = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            geofences::table
                .select(Geofence::as_select())
                .load(&mut conn)
        })
        .await??;

        self.by_name.clear();
        self.by_type.clear();

        for g in rows.iter() {
            let g = Arc::new(g.clone());
            self.by_name.insert(g.name.clone(), g.clone());
            self.by_type.entry(g.type_id).or_default().push(g);
        }

        info!("loaded {} geofences into store", rows.len());
        Ok(rows.len())
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<Geofence>> {
        self.by_name.get(name).map(|e| e.clone())
    }

    pub fn by_type(&self, type_id: GeofenceType) -> Vec<Arc<Geofence>> {
        self.by_type.get(&type_id).map(|e| e.clone()).unwrap_or_default()
    }

    /// Geofences of `type_id` whose name starts with `country_code`.
    pub fn by_type_and_country(&self, type_id: GeofenceType, country_code: &str) -> Vec<Arc<Geofence>> {
        self.by_type(type_id)
            .into_iter()
            .filter(|g| g.name.starts_with(country_code))
            .collect()
    }

    /// Single containing geofence via `ST_Contains`. Ties among nested
    /// polygons are broken by storage order; callers should not depend on
    /// which one wins.
    pub async fn find_containing(&self, point: LonLat) -> Result<Option<Arc<Geofence>>> {
        let all = self.find_all_containing(point).await?;
        Ok(all.into_iter().next())
    }

    /// Every geofence whose polygon contains `point`.
    pub async fn find_all_containing(&self, point: LonLat) -> Result<Vec<Arc<Geofence>>> {
        let pool = self.pool.clone();
        let (lon, lat) = point;

        let ids: Vec<Uuid> = tokio::task::spawn_blocking(move || {
            use crate::postgis_functions::{st_make_point, st_set_srid};

            let mut conn = pool.get()?;
            geofences::table
                .filter(st_contains(
                    geofences::geometry,
                    st_set_srid(st_make_point(lon, lat), 4326),
                ))
                .select(geofences::id)
                .load(&mut conn)
        })
        .await??;

        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(g) = self.by_name.iter().find(|e| e.value().id == id).map(|e| e.value().clone()) {
                result.push(g);
            } else {
                warn!(geofence_id = %id, "containing geofence not present in cache; reload may be stale");
            }
        }
        Ok(result)
    }

    /// Arithmetic mean of the polygon's exterior ring vertices.
    pub async fn centroid(&self, geofence_id: Uuid) -> Result<LonLat> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            #[derive(QueryableByName)]
            struct CentroidRow {
                #[diesel(sql_type = sql_types::Double)]
                lon: f64,
                #[diesel(sql_type = sql_types::Double)]
                lat: f64,
            }

            // ST_Points collects every ring vertex into a MULTIPOINT; centroid of
            // that is the arithmetic mean of the vertices, not the polygon's area
            // centroid (which ST_Centroid(geometry) directly would give).
            let row: CentroidRow = diesel::sql_query(
                "SELECT ST_X(ST_Centroid(ST_Points(geometry::geometry))) AS lon, \
                        ST_Y(ST_Centroid(ST_Points(geometry::geometry))) AS lat \
                 FROM geofences WHERE id = $1",
            )
            .bind::<sql_types::Uuid, _>(geofence_id)
            .get_result(&mut conn)
            .with_context(|| format!("no geofence with id {geofence_id}"))?;

            Ok((row.lon, row.lat))
        })
        .await?
    }

    /// Idempotent upsert by unique name. Not used by the simulation loop
    /// itself — the store assumes it is pre-populated — but kept as the
    /// primitive bootstrap fixtures and migrations build on.
    pub async fn upsert(&self, new: NewGeofence) -> Result<()> {
        let pool = self.pool.clone();
        let now = Utc::now();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let ring_wkt = new
                .ring
                .iter()
                .map(|(lon, lat)| format!("{lon} {lat}"))
                .collect::<Vec<_>>()
                .join(", ");
            let polygon_wkt = format!("POLYGON(({ring_wkt}))");

            diesel::sql_query(
                "INSERT INTO geofences (id, name, type_id, un_locode, smdg_code, description, geometry, created_at, updated_at) \
                 VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, ST_SetSRID(ST_GeomFromText($6), 4326), $7, $7) \
                 ON CONFLICT (name) DO UPDATE SET \
                   type_id = EXCLUDED.type_id, \
                   un_locode = EXCLUDED.un_locode, \
                   smdg_code = EXCLUDED.smdg_code, \
                   description = EXCLUDED.description, \
                   geometry = EXCLUDED.geometry, \
                   updated_at = EXCLUDED.updated_at",
            )
            .bind::<sql_types::Text, _>(&new.name)
            .bind::<crate::schema::sql_types::GeofenceTypeEnum, _>(new.type_id)
            .bind::<sql_types::Nullable<sql_types::Text>, _>(new.un_locode.as_deref())
            .bind::<sql_types::Nullable<sql_types::Text>, _>(new.smdg_code.as_deref())
            .bind::<sql_types::Nullable<sql_types::Text>, _>(new.description.as_deref())
            .bind::<sql_types::Text, _>(&polygon_wkt)
            .bind::<sql_types::Timestamptz, _>(now)
            .execute(&mut conn)?;

            Ok::<(), anyhow::Error>(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_type_and_country_filters_on_name_prefix() {
        let store = GeofenceStore {
            pool: test_pool_placeholder(),
            by_name: Arc::new(DashMap::new()),
            by_type: Arc::new(DashMap::new()),
        };

        let g1 = Arc::new(sample_geofence("USLAX Terminal", GeofenceType::Terminal));
        let g2 = Arc::new(sample_geofence("DEHAM Terminal", GeofenceType::Terminal));
        store.by_type.entry(GeofenceType::Terminal).or_default().push(g1.clone());
        store.by_type.entry(GeofenceType::Terminal).or_default().push(g2);

        let us_terminals = store.by_type_and_country(GeofenceType::Terminal, "US");
        assert_eq!(us_terminals.len(), 1);
        assert_eq!(us_terminals[0].name, g1.name);
    }

    fn sample_geofence(name: &str, type_id: GeofenceType) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            name: name.to_string(),
            type_id,
            un_locode: None,
            smdg_code: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Only used to satisfy `GeofenceStore`'s field type in unit tests that
    /// never open a real connection.
    fn test_pool_placeholder() -> PgPool {
        let manager = ConnectionManager::<PgConnection>::new("postgres://unused/unused");
        Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .build_unchecked(manager)
    }
}
