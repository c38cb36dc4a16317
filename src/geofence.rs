//! Geofence models.
//!
//! A geofence is a named polygon boundary — a terminal yard, a depot, or a
//! rail ramp. Resolution (which geofence a point falls inside) lives in
//! `geofence_repo`.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::geofences;

/// Kind of facility a geofence polygon represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::GeofenceTypeEnum")]
pub enum GeofenceType {
    #[db_enum(rename = "Terminal")]
    Terminal,
    #[db_enum(rename = "Depot")]
    Depot,
    #[db_enum(rename = "RailRamp")]
    RailRamp,
}

/// A named polygon boundary, as resolved from the database.
///
/// Holds everything but the geometry itself — containment checks are
/// delegated to `ST_Contains` rather than reimplemented client-side, so the
/// hot read-through cache (`geofence_repo::GeofenceStore`) never needs to hold
/// the polygon in memory. Bootstrap, which does need real coordinates to seed
/// container journeys, fetches geometry separately via a raw query.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = geofences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub type_id: GeofenceType,
    pub un_locode: Option<String>,
    pub smdg_code: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    /// First two characters of the UN/LOCODE (or the name), used by the
    /// route generator and event pipeline to classify a region.
    pub fn country_code(&self) -> Option<&str> {
        self.un_locode
            .as_deref()
            .filter(|c| c.len() >= 2)
            .or(self.name.get(0..2).filter(|_| self.name.len() >= 2))
            .map(|c| &c[0..2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, un_locode: Option<&str>) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            name: name.to_string(),
            type_id: GeofenceType::Terminal,
            un_locode: un_locode.map(|s| s.to_string()),
            smdg_code: None,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn country_code_prefers_un_locode() {
        let g = sample("Everglades Terminal", Some("USEVG"));
        assert_eq!(g.country_code(), Some("US"));
    }

    #[test]
    fn country_code_falls_back_to_name_prefix() {
        let g = sample("USLAX Terminal", None);
        assert_eq!(g.country_code(), Some("US"));
    }

    #[test]
    fn country_code_none_when_name_too_short() {
        let g = sample("X", None);
        assert_eq!(g.country_code(), None);
    }
}
