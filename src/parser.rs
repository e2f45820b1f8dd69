//! Entry extraction from raw monitored-file content.
//!
//! The parser is pure: it turns one raw line (or one JSON document) into a
//! normalized [`SwingRecord`] and performs no I/O. Failures are recoverable
//! per line; the caller logs and moves on.

use crate::config::{SourceConfig, SourceMode};
use crate::schema::{self, SwingRecord};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while extracting a record from one line
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("marker '{marker}' matched but no payload followed")]
    MissingPayload { marker: String },

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Extracts a structured swing record from one raw input line.
///
/// Construction fixes the input shape; `parse_line` then yields `Ok(None)`
/// for lines that are not candidates, `Ok(Some(record))` for recognized
/// entries, and `Err` for candidates with a malformed payload.
#[derive(Debug, Clone)]
pub enum EntryParser {
    /// Launch-monitor connector log: marker substring + JSON payload
    LogLine {
        markers: Vec<String>,
        allowed_fields: Vec<String>,
    },
    /// GSPro stream: one shot document per line
    ShotStream,
}

/// Launch-monitor payload fields recognized by the static schema
#[derive(Debug, Default, Deserialize)]
struct LinePayload {
    club: Option<String>,
    speed: Option<f64>,
    spin_axis: Option<f64>,
    total_spin: Option<f64>,
    back_spin: Option<f64>,
    side_spin: Option<f64>,
    hla: Option<f64>,
    vla: Option<f64>,
    club_speed: Option<f64>,
    path: Option<f64>,
    face_to_target: Option<f64>,
    angle_of_attack: Option<f64>,
    speed_at_impact: Option<f64>,
}

/// GSPro shot document, provider field names
#[derive(Debug, Deserialize)]
struct GsproShot {
    #[serde(rename = "ShotKey")]
    shot_key: String,
    #[serde(rename = "RoundKey")]
    round_key: Option<String>,
    #[serde(rename = "PlayerName")]
    player_name: Option<String>,
    #[serde(rename = "GlobalShotNumber")]
    shot_number: Option<i64>,
    #[serde(rename = "ClubIndex")]
    club_index: Option<i64>,
    #[serde(rename = "TotalDistance")]
    total_distance: Option<f64>,
    #[serde(rename = "BallData")]
    ball_data: GsproBallData,
    #[serde(rename = "ClubData")]
    club_data: Option<GsproClubData>,
    #[serde(rename = "StartingPOS")]
    starting_pos: Option<GsproPosition>,
    #[serde(rename = "EndingPOS")]
    ending_pos: Option<GsproPosition>,
}

#[derive(Debug, Default, Deserialize)]
struct GsproBallData {
    #[serde(rename = "Speed")]
    speed: Option<f64>,
    #[serde(rename = "TotalSpin")]
    total_spin: Option<f64>,
    #[serde(rename = "BackSpin")]
    back_spin: Option<f64>,
    #[serde(rename = "SideSpin")]
    side_spin: Option<f64>,
    #[serde(rename = "SpinAxis")]
    spin_axis: Option<f64>,
    #[serde(rename = "HLA")]
    hla: Option<f64>,
    #[serde(rename = "VLA")]
    vla: Option<f64>,
    #[serde(rename = "CarryDistance")]
    carry_distance: Option<f64>,
    #[serde(rename = "Offline")]
    offline: Option<f64>,
    // Provider field name carries this spelling on the wire
    #[serde(rename = "DecentAngle")]
    descent_angle: Option<f64>,
    #[serde(rename = "PeakHeight")]
    peak_height: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct GsproClubData {
    #[serde(rename = "Speed")]
    speed: Option<f64>,
    #[serde(rename = "AngleOfAttack")]
    angle_of_attack: Option<f64>,
    #[serde(rename = "FaceToTarget")]
    face_to_target: Option<f64>,
    #[serde(rename = "Path")]
    path: Option<f64>,
    #[serde(rename = "SpeedAtImpact")]
    speed_at_impact: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct GsproPosition {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

impl EntryParser {
    /// Build a parser for the configured source mode
    pub fn from_config(source: &SourceConfig) -> Self {
        match source.mode {
            SourceMode::LaunchMonitor => Self::LogLine {
                markers: source.monitored_entries.clone(),
                allowed_fields: source.allowed_fields.clone(),
            },
            SourceMode::Gspro => Self::ShotStream,
        }
    }

    /// Parse one raw line into a normalized record
    pub fn parse_line(&self, line: &str) -> Result<Option<SwingRecord>, ParseError> {
        match self {
            Self::LogLine {
                markers,
                allowed_fields,
            } => parse_log_line(line, markers, allowed_fields),
            Self::ShotStream => parse_shot_document(line),
        }
    }
}

/// Parse a launch-monitor log line.
///
/// A line is a candidate only if it contains one of the marker substrings.
/// The identity key is the leading whitespace-delimited token; the payload
/// is the JSON object following `"<marker>: "`.
fn parse_log_line(
    line: &str,
    markers: &[String],
    allowed_fields: &[String],
) -> Result<Option<SwingRecord>, ParseError> {
    let Some(marker) = markers.iter().find(|m| line.contains(m.as_str())) else {
        return Ok(None);
    };

    let timestamp = line.split_whitespace().next().unwrap_or_default();

    let separator = format!("{marker}: ");
    let json_str = line
        .split_once(separator.as_str())
        .map(|(_, rest)| rest.trim())
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| ParseError::MissingPayload {
            marker: marker.clone(),
        })?;

    let payload: Value = serde_json::from_str(json_str)?;
    let payload = payload.as_object().ok_or(ParseError::NotAnObject)?;

    // Drop everything outside the allow-list before typed decoding, so an
    // excluded-but-recognized field still lands as NULL.
    let filtered = schema::filter_allowed_fields(payload, allowed_fields);
    let fields: LinePayload = serde_json::from_value(Value::Object(filtered))?;

    let mut record = SwingRecord::with_identity(timestamp);
    record.club_index = fields
        .club
        .as_deref()
        .and_then(schema::club_index_for_label);
    record.club = fields.club;
    record.speed = fields.speed;
    record.spin_axis = fields.spin_axis;
    record.total_spin = fields.total_spin;
    record.back_spin = fields.back_spin;
    record.side_spin = fields.side_spin;
    record.hla = fields.hla;
    record.vla = fields.vla;
    record.club_speed = fields.club_speed;
    record.path = fields.path;
    record.face_to_target = fields.face_to_target;
    record.angle_of_attack = fields.angle_of_attack;
    record.speed_at_impact = fields.speed_at_impact;

    Ok(Some(record))
}

/// Parse one GSPro shot document.
///
/// A line is a candidate only if it mentions both `ShotKey` and `BallData`;
/// anything else on the stream is ignored without decoding.
fn parse_shot_document(line: &str) -> Result<Option<SwingRecord>, ParseError> {
    let line = line.trim();
    if !(line.contains("ShotKey") && line.contains("BallData")) {
        return Ok(None);
    }

    let shot: GsproShot = serde_json::from_str(line)?;

    let mut record = SwingRecord::with_identity(shot.shot_key);
    record.club_index = shot.club_index;
    record.club = shot
        .club_index
        .and_then(schema::club_label_for_index)
        .map(String::from);
    record.round_key = shot.round_key;
    record.player_name = shot.player_name;
    record.shot_number = shot.shot_number;
    record.total_distance = shot.total_distance;

    let ball = shot.ball_data;
    record.speed = ball.speed;
    record.total_spin = ball.total_spin;
    record.back_spin = ball.back_spin;
    record.side_spin = ball.side_spin;
    record.spin_axis = ball.spin_axis;
    record.hla = ball.hla;
    record.vla = ball.vla;
    record.carry_distance = ball.carry_distance;
    record.offline = ball.offline;
    record.descent_angle = ball.descent_angle;
    record.peak_height = ball.peak_height;

    if let Some(club) = shot.club_data {
        record.club_speed = club.speed;
        record.angle_of_attack = club.angle_of_attack;
        record.face_to_target = club.face_to_target;
        record.path = club.path;
        record.speed_at_impact = club.speed_at_impact;
    }

    if let Some(pos) = shot.starting_pos {
        record.start_x = pos.x;
        record.start_y = pos.y;
        record.start_z = pos.z;
    }

    if let Some(pos) = shot.ending_pos {
        record.end_x = pos.x;
        record.end_y = pos.y;
        record.end_z = pos.z;
    }

    Ok(Some(record))
}
