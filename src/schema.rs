//! Canonical swing record and the static schema shared by the ingestion
//! and query paths.
//!
//! The persisted column set is fixed here at compile time; neither the
//! ingestion pipeline nor the API discovers field names from the storage
//! engine at runtime.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Canonical ingested swing/shot record.
///
/// The identity key is a timestamp token in launch-monitor mode and the
/// provider-assigned shot key in GSPro mode. Measurement fields absent in
/// the source event stay `None` and persist as NULL, never fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SwingRecord {
    /// Unique key distinguishing one physical swing from all others
    pub identity_key: String,
    /// Textual club/category label
    pub club: Option<String>,
    /// Numeric club/category index
    pub club_index: Option<i64>,
    /// Ball speed
    pub speed: Option<f64>,
    /// Spin axis
    pub spin_axis: Option<f64>,
    /// Total spin rate
    pub total_spin: Option<f64>,
    /// Back spin component
    pub back_spin: Option<f64>,
    /// Side spin component
    pub side_spin: Option<f64>,
    /// Horizontal launch angle
    pub hla: Option<f64>,
    /// Vertical launch angle
    pub vla: Option<f64>,
    /// Clubhead speed
    pub club_speed: Option<f64>,
    /// Club path
    pub path: Option<f64>,
    /// Face angle relative to target
    pub face_to_target: Option<f64>,
    /// Angle of attack
    pub angle_of_attack: Option<f64>,
    /// Ball speed at impact
    pub speed_at_impact: Option<f64>,
    /// Carry distance
    pub carry_distance: Option<f64>,
    /// Total distance
    pub total_distance: Option<f64>,
    /// Offline distance
    pub offline: Option<f64>,
    /// Descent angle
    pub descent_angle: Option<f64>,
    /// Peak trajectory height
    pub peak_height: Option<f64>,
    /// Ball start position
    pub start_x: Option<f64>,
    pub start_y: Option<f64>,
    pub start_z: Option<f64>,
    /// Ball end position
    pub end_x: Option<f64>,
    pub end_y: Option<f64>,
    pub end_z: Option<f64>,
    /// Provider round key (GSPro mode)
    pub round_key: Option<String>,
    /// Provider player name (GSPro mode)
    pub player_name: Option<String>,
    /// Provider shot number within the session (GSPro mode)
    pub shot_number: Option<i64>,
}

impl SwingRecord {
    /// Create an empty record carrying only the identity key
    pub fn with_identity(identity_key: impl Into<String>) -> Self {
        Self {
            identity_key: identity_key.into(),
            club: None,
            club_index: None,
            speed: None,
            spin_axis: None,
            total_spin: None,
            back_spin: None,
            side_spin: None,
            hla: None,
            vla: None,
            club_speed: None,
            path: None,
            face_to_target: None,
            angle_of_attack: None,
            speed_at_impact: None,
            carry_distance: None,
            total_distance: None,
            offline: None,
            descent_angle: None,
            peak_height: None,
            start_x: None,
            start_y: None,
            start_z: None,
            end_x: None,
            end_y: None,
            end_z: None,
            round_key: None,
            player_name: None,
            shot_number: None,
        }
    }
}

/// Retain only allow-listed keys from a raw payload object.
///
/// Keys outside the allow-list are dropped; allow-listed keys missing from
/// the payload stay absent and deserialize to `None`.
pub fn filter_allowed_fields(payload: &Map<String, Value>, allowed: &[String]) -> Map<String, Value> {
    payload
        .iter()
        .filter(|(key, _)| allowed.iter().any(|a| a == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Static club label <-> index mapping shared by both source modes.
///
/// Launch-monitor entries carry a textual club name; GSPro shots carry a
/// numeric club index. The mapping is fixed here so category queries work
/// uniformly regardless of which source produced a record.
const CLUB_TABLE: &[(&str, i64)] = &[
    ("driver", 1),
    ("3_wood", 2),
    ("5_wood", 3),
    ("7_wood", 4),
    ("2_hybrid", 5),
    ("3_hybrid", 6),
    ("4_hybrid", 7),
    ("1_iron", 8),
    ("2_iron", 9),
    ("3_iron", 10),
    ("4_iron", 11),
    ("5_iron", 12),
    ("6_iron", 13),
    ("7_iron", 14),
    ("8_iron", 15),
    ("9_iron", 16),
    ("pitching_wedge", 17),
    ("gap_wedge", 18),
    ("sand_wedge", 19),
    ("lob_wedge", 20),
    ("putter", 21),
];

/// Look up the numeric index for a textual club label
pub fn club_index_for_label(label: &str) -> Option<i64> {
    CLUB_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .map(|(_, index)| *index)
}

/// Look up the textual label for a numeric club index
pub fn club_label_for_index(index: i64) -> Option<&'static str> {
    CLUB_TABLE
        .iter()
        .find(|(_, i)| *i == index)
        .map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_drops_unrecognized_fields() {
        let payload = json!({
            "club": "7_iron",
            "speed": 90.0,
            "bogus": "dropped",
            "another_extra": 42
        });
        let allowed = vec!["club".to_string(), "speed".to_string()];

        let filtered = filter_allowed_fields(payload.as_object().unwrap(), &allowed);

        assert_eq!(filtered.len(), 2);
        assert!(filtered.contains_key("club"));
        assert!(filtered.contains_key("speed"));
        assert!(!filtered.contains_key("bogus"));
    }

    #[test]
    fn test_missing_allowed_fields_deserialize_to_none() {
        let payload = json!({ "club": "driver" });
        let allowed = vec!["club".to_string(), "speed".to_string()];

        let filtered = filter_allowed_fields(payload.as_object().unwrap(), &allowed);
        let mut record = SwingRecord::with_identity("t0");
        record.club = filtered
            .get("club")
            .and_then(|v| v.as_str())
            .map(String::from);
        record.speed = filtered.get("speed").and_then(|v| v.as_f64());

        assert_eq!(record.club.as_deref(), Some("driver"));
        assert_eq!(record.speed, None);
    }

    #[test]
    fn test_club_mapping_round_trip() {
        for (label, index) in CLUB_TABLE {
            assert_eq!(club_index_for_label(label), Some(*index));
            assert_eq!(club_label_for_index(*index), Some(*label));
        }
    }

    #[test]
    fn test_club_mapping_unknown() {
        assert_eq!(club_index_for_label("foot_wedge"), None);
        assert_eq!(club_label_for_index(99), None);
    }

    #[test]
    fn test_club_mapping_case_insensitive() {
        assert_eq!(club_index_for_label("Driver"), Some(1));
        assert_eq!(club_index_for_label("SAND_WEDGE"), Some(19));
    }
}
