//! Shipping chokepoints and regional classification.
//!
//! Waypoints here keep generated ocean routes inside real shipping lanes
//! rather than cutting across land masses. Values are the real-world
//! coordinates for each strait/canal, not derived from any geofence data.

use crate::geometry::LonLat;

/// A named shipping chokepoint with the waypoints a route passes through.
pub struct Chokepoint {
    pub key: &'static str,
    pub name: &'static str,
    pub waypoints: &'static [LonLat],
}

pub const SUEZ: Chokepoint = Chokepoint {
    key: "suez",
    name: "Suez Canal",
    waypoints: &[(32.37, 31.23), (32.55, 30.00), (32.53, 29.93)],
};
pub const PANAMA: Chokepoint = Chokepoint {
    key: "panama",
    name: "Panama Canal",
    waypoints: &[(-79.92, 9.38), (-79.55, 8.95)],
};
pub const MALACCA: Chokepoint = Chokepoint {
    key: "malacca",
    name: "Strait of Malacca",
    waypoints: &[(100.0, 5.0), (103.5, 1.2)],
};
pub const GIBRALTAR: Chokepoint = Chokepoint {
    key: "gibraltar",
    name: "Strait of Gibraltar",
    waypoints: &[(-5.6, 35.95), (-5.95, 35.9)],
};
pub const CAPE_GOOD_HOPE: Chokepoint = Chokepoint {
    key: "cape_good_hope",
    name: "Cape of Good Hope",
    waypoints: &[(18.47, -34.36), (20.0, -35.0), (25.0, -34.0)],
};
pub const ENGLISH_CHANNEL: Chokepoint = Chokepoint {
    key: "english_channel",
    name: "English Channel",
    waypoints: &[(-1.5, 50.0), (1.5, 51.0)],
};
pub const BAB_EL_MANDEB: Chokepoint = Chokepoint {
    key: "bab_el_mandeb",
    name: "Bab el-Mandeb Strait",
    waypoints: &[(43.3, 12.6), (43.5, 12.4)],
};
pub const SINGAPORE: Chokepoint = Chokepoint {
    key: "singapore",
    name: "Singapore Strait",
    waypoints: &[(103.8, 1.25), (104.1, 1.2)],
};
pub const TAIWAN: Chokepoint = Chokepoint {
    key: "taiwan",
    name: "Taiwan Strait",
    waypoints: &[(119.5, 24.0), (120.0, 25.0)],
};
pub const HORMUZ: Chokepoint = Chokepoint {
    key: "hormuz",
    name: "Strait of Hormuz",
    waypoints: &[(56.4, 26.5), (56.0, 26.0)],
};

const ALL_CHOKEPOINTS: &[&Chokepoint] = &[
    &SUEZ,
    &PANAMA,
    &MALACCA,
    &GIBRALTAR,
    &CAPE_GOOD_HOPE,
    &ENGLISH_CHANNEL,
    &BAB_EL_MANDEB,
    &SINGAPORE,
    &TAIWAN,
    &HORMUZ,
];

/// Look up a chokepoint by its key (e.g. `"suez"`).
pub fn chokepoint_by_key(key: &str) -> Option<&'static Chokepoint> {
    ALL_CHOKEPOINTS.iter().copied().find(|c| c.key == key)
}

/// Region code, country membership and an optional longitude split (used
/// only to distinguish US_EAST from US_WEST).
struct RegionDef {
    region: &'static str,
    countries: &'static [&'static str],
    /// `Some(f)` returns true when a longitude belongs to this region.
    lon_filter: Option<fn(f64) -> bool>,
}

const REGIONS: &[RegionDef] = &[
    RegionDef {
        region: "US_EAST",
        countries: &["US"],
        lon_filter: Some(|lon| lon > -100.0),
    },
    RegionDef {
        region: "US_WEST",
        countries: &["US"],
        lon_filter: Some(|lon| lon <= -100.0),
    },
    RegionDef {
        region: "CANADA",
        countries: &["CA"],
        lon_filter: None,
    },
    RegionDef {
        region: "EU",
        countries: &[
            "GB", "DE", "NL", "BE", "FR", "ES", "IT", "PT", "PL", "SE", "NO", "DK", "FI", "IE",
        ],
        lon_filter: None,
    },
    RegionDef {
        region: "MED",
        countries: &["ES", "IT", "GR", "TR", "HR", "SI", "MT", "CY"],
        lon_filter: None,
    },
    RegionDef {
        region: "CHINA",
        countries: &["CN", "HK"],
        lon_filter: None,
    },
    RegionDef {
        region: "JAPAN",
        countries: &["JP"],
        lon_filter: None,
    },
    RegionDef {
        region: "KOREA",
        countries: &["KR"],
        lon_filter: None,
    },
    RegionDef {
        region: "ASIA",
        countries: &["CN", "JP", "KR", "TW", "HK", "SG", "MY", "TH", "VN", "ID", "PH"],
        lon_filter: None,
    },
    RegionDef {
        region: "INDIA",
        countries: &["IN", "BD", "LK", "PK"],
        lon_filter: None,
    },
    RegionDef {
        region: "MENA",
        countries: &["AE", "SA", "EG", "IL", "TR", "JO", "OM", "QA", "KW", "BH"],
        lon_filter: None,
    },
    RegionDef {
        region: "OCEANIA",
        countries: &["AU", "NZ"],
        lon_filter: None,
    },
    RegionDef {
        region: "ATLANTIC",
        countries: &["BR", "AR", "CL", "CO", "VE", "PE", "EC"],
        lon_filter: None,
    },
    RegionDef {
        region: "AFRICA",
        countries: &["ZA", "KE", "NG", "GH", "TZ", "MA", "DZ", "TN"],
        lon_filter: None,
    },
];

/// Ordered chokepoint keys for a region pair, or `&[]` for a direct route.
/// Falls back to the reversed route when only the inverse pair is known.
fn route_chokepoints(origin: &str, dest: &str) -> Option<Vec<&'static str>> {
    const ROUTES: &[(&str, &str, &[&str])] = &[
        ("ASIA", "EU", &["malacca", "singapore", "bab_el_mandeb", "suez", "gibraltar"]),
        (
            "CHINA",
            "EU",
            &["taiwan", "malacca", "singapore", "bab_el_mandeb", "suez", "gibraltar"],
        ),
        ("JAPAN", "EU", &["malacca", "singapore", "bab_el_mandeb", "suez", "gibraltar"]),
        ("KOREA", "EU", &["malacca", "singapore", "bab_el_mandeb", "suez", "gibraltar"]),
        ("ASIA", "US_EAST", &["malacca", "singapore", "bab_el_mandeb", "suez", "gibraltar"]),
        (
            "CHINA",
            "US_EAST",
            &["taiwan", "malacca", "singapore", "bab_el_mandeb", "suez", "gibraltar"],
        ),
        ("ASIA", "US_WEST", &[]),
        ("CHINA", "US_WEST", &[]),
        ("JAPAN", "US_WEST", &[]),
        ("KOREA", "US_WEST", &[]),
        ("EU", "US_EAST", &["english_channel"]),
        ("EU", "US_WEST", &["english_channel", "panama"]),
        ("MED", "US_EAST", &["gibraltar"]),
        ("MED", "US_WEST", &["gibraltar", "panama"]),
        ("US_EAST", "US_WEST", &["panama"]),
        ("MENA", "ASIA", &["hormuz", "singapore", "malacca"]),
        ("MENA", "EU", &["suez", "gibraltar"]),
        ("MENA", "US_EAST", &["suez", "gibraltar"]),
        ("INDIA", "EU", &["bab_el_mandeb", "suez", "gibraltar"]),
        ("INDIA", "US_EAST", &["bab_el_mandeb", "suez", "gibraltar"]),
        ("INDIA", "ASIA", &["singapore", "malacca"]),
        ("INDIA", "CHINA", &["singapore", "malacca"]),
        ("OCEANIA", "ASIA", &["singapore"]),
        (
            "OCEANIA",
            "EU",
            &["singapore", "malacca", "bab_el_mandeb", "suez", "gibraltar"],
        ),
        ("OCEANIA", "US_WEST", &[]),
        ("AFRICA", "EU", &["cape_good_hope", "gibraltar"]),
        ("AFRICA", "ASIA", &["cape_good_hope", "singapore"]),
        ("AFRICA", "US_EAST", &["cape_good_hope"]),
    ];

    if let Some((_, _, keys)) = ROUTES.iter().find(|(o, d, _)| *o == origin && *d == dest) {
        return Some(keys.to_vec());
    }
    if let Some((_, _, keys)) = ROUTES.iter().find(|(o, d, _)| *o == dest && *d == origin) {
        return Some(keys.iter().rev().copied().collect());
    }
    None
}

/// Classify a terminal's region from its ISO country prefix, optionally
/// disambiguating US_EAST/US_WEST by longitude.
pub fn classify_region(country_code: &str, centroid_lon: Option<f64>) -> &'static str {
    let matches: Vec<&RegionDef> = REGIONS
        .iter()
        .filter(|r| r.countries.contains(&country_code))
        .collect();

    match matches.as_slice() {
        [] => "UNKNOWN",
        [only] => only.region,
        many => {
            if country_code == "US" {
                if let Some(lon) = centroid_lon {
                    if let Some(region) = many
                        .iter()
                        .find(|r| r.lon_filter.is_some_and(|f| f(lon)))
                    {
                        return region.region;
                    }
                }
            }
            many[0].region
        }
    }
}

/// Chokepoints a route between two regions should pass through, in order.
/// Returns an empty vec for direct routes with no known chokepoint data.
pub fn chokepoints_for_regions(origin_region: &str, dest_region: &str) -> Vec<&'static str> {
    route_chokepoints(origin_region, dest_region).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_chokepoint() {
        let suez = chokepoint_by_key("suez").unwrap();
        assert_eq!(suez.name, "Suez Canal");
        assert_eq!(suez.waypoints.len(), 3);
    }

    #[test]
    fn unknown_chokepoint_key_is_none() {
        assert!(chokepoint_by_key("nonexistent").is_none());
    }

    #[test]
    fn single_region_country_resolves_without_centroid() {
        assert_eq!(classify_region("JP", None), "JAPAN");
    }

    #[test]
    fn us_east_west_split_on_longitude() {
        assert_eq!(classify_region("US", Some(-74.0)), "US_EAST");
        assert_eq!(classify_region("US", Some(-122.0)), "US_WEST");
    }

    #[test]
    fn unknown_country_falls_back() {
        assert_eq!(classify_region("ZZ", None), "UNKNOWN");
    }

    #[test]
    fn direct_route_has_no_chokepoints() {
        assert!(chokepoints_for_regions("ASIA", "US_WEST").is_empty());
    }

    #[test]
    fn known_route_returns_ordered_chokepoints() {
        let chokes = chokepoints_for_regions("EU", "US_EAST");
        assert_eq!(chokes, vec!["english_channel"]);
    }

    #[test]
    fn reverse_route_falls_back_to_reversed_chokepoints() {
        let forward = chokepoints_for_regions("MED", "US_WEST");
        let reverse = chokepoints_for_regions("US_WEST", "MED");
        let mut expected = forward.clone();
        expected.reverse();
        assert_eq!(reverse, expected);
    }

    #[test]
    fn unrelated_region_pair_has_no_route() {
        assert!(chokepoints_for_regions("JAPAN", "AFRICA").is_empty());
    }
}
