#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and catalog parsing for the sorting cell.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The `[[actuators]]` table is checked once at load: every device the
//!   planner drives must be present exactly once.
//! - Catalog CSV loader enforces headers before any row is accepted.
use serde::Deserialize;
use sorter_traits::{Shape, TargetSpec, TargetStatus};
use std::collections::HashSet;

/// Catalog CSV schema.
///
/// Expected headers:
/// common_id,length,width,height,shape,status
///
/// Example:
/// common_id,length,width,height,shape,status
/// A-100,600,400,200,box,pending
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogRow {
    pub common_id: String,
    pub length: f32,
    pub width: f32,
    pub height: f32,
    pub shape: String,
    pub status: String,
}

impl CatalogRow {
    /// Target view of this row; `pending_status` is the string that marks a row as pending.
    pub fn to_target(&self, pending_status: &str) -> TargetSpec {
        TargetSpec {
            common_id: self.common_id.clone(),
            length_mm: self.length,
            width_mm: self.width,
            height_mm: self.height,
            shape: Shape::from_catalog(&self.shape),
            status: if self.status == pending_status {
                TargetStatus::Pending
            } else {
                TargetStatus::Processed
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SerialCfg {
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 {
    9600
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HeightCfg {
    /// calibrated = scale * raw + offset
    pub scale: f32,
    pub offset: f32,
    /// Calibrated samples above this are discarded.
    pub max_valid_mm: f32,
    /// Rolling average window (samples).
    pub window: usize,
}

impl Default for HeightCfg {
    fn default() -> Self {
        Self {
            scale: -1.305,
            offset: 382.4,
            max_valid_mm: 100.0,
            window: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CameraCfg {
    pub mm_per_pixel: f32,
    pub frame_width_px: u32,
    pub frame_height_px: u32,
    #[serde(default = "default_camera_hz")]
    pub sample_rate_hz: u32,
}

fn default_camera_hz() -> u32 {
    15
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotionCfg {
    /// Pusher 1 stroke that stages the object under the camera.
    pub staging_mm: f32,
    /// Pusher 1 stroke that hands the object to conveyor 2.
    pub handoff_mm: f32,
    /// Pusher 2 stroke that ejects the object off the second table.
    pub full_travel_mm: f32,
    /// Upper bound accepted by the gateway for any forward pusher move.
    pub pusher_max_distance_mm: f32,
    /// Extra retract distance beyond the footprint half diagonal.
    pub clearance_margin_mm: f32,
    /// Turntable settle time.
    pub settle_ms: u64,
    /// Flipper dwell in the exit position.
    pub flip_dwell_ms: u64,
    /// Conveyor 2 run time when no flip happened.
    pub conveyor2_direct_ms: u64,
    /// Conveyor 2 run time after a flip.
    pub conveyor2_after_flip_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            staging_mm: 250.0,
            handoff_mm: 250.0,
            full_travel_mm: 250.0,
            pusher_max_distance_mm: 300.0,
            clearance_margin_mm: 5.0,
            settle_ms: 500,
            flip_dwell_ms: 5000,
            conveyor2_direct_ms: 2000,
            conveyor2_after_flip_ms: 1000,
        }
    }
}

/// Device class of an actuator table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Conveyor,
    Pusher,
    Rotator,
    Flipper,
}

impl DeviceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Conveyor => "conveyor",
            DeviceKind::Pusher => "pusher",
            DeviceKind::Rotator => "rotator",
            DeviceKind::Flipper => "flipper",
        }
    }
}

/// One row of the static actuator table, keyed by `(kind, id)`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActuatorEntry {
    Conveyor {
        id: u8,
        servo: u8,
    },
    Pusher {
        id: u8,
        servo: u8,
        /// Calibrated stroke speed.
        mm_per_s: f32,
    },
    Rotator {
        id: u8,
        servo: u8,
    },
    Flipper {
        id: u8,
        servo: u8,
        clear: u16,
        enter: u16,
        exit: u16,
    },
}

impl ActuatorEntry {
    pub const fn kind(&self) -> DeviceKind {
        match self {
            ActuatorEntry::Conveyor { .. } => DeviceKind::Conveyor,
            ActuatorEntry::Pusher { .. } => DeviceKind::Pusher,
            ActuatorEntry::Rotator { .. } => DeviceKind::Rotator,
            ActuatorEntry::Flipper { .. } => DeviceKind::Flipper,
        }
    }

    pub const fn id(&self) -> u8 {
        match *self {
            ActuatorEntry::Conveyor { id, .. }
            | ActuatorEntry::Pusher { id, .. }
            | ActuatorEntry::Rotator { id, .. }
            | ActuatorEntry::Flipper { id, .. } => id,
        }
    }

    pub const fn servo(&self) -> u8 {
        match *self {
            ActuatorEntry::Conveyor { servo, .. }
            | ActuatorEntry::Pusher { servo, .. }
            | ActuatorEntry::Rotator { servo, .. }
            | ActuatorEntry::Flipper { servo, .. } => servo,
        }
    }
}

/// Devices the orientation sequence drives; all must be present in the table.
pub const REQUIRED_DEVICES: [(DeviceKind, u8); 8] = [
    (DeviceKind::Conveyor, 1),
    (DeviceKind::Conveyor, 2),
    (DeviceKind::Pusher, 1),
    (DeviceKind::Pusher, 2),
    (DeviceKind::Rotator, 1),
    (DeviceKind::Rotator, 2),
    (DeviceKind::Flipper, 1),
    (DeviceKind::Flipper, 2),
];

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Pair measured (length, width) against both catalog footprint orientations.
    #[default]
    Footprint,
    /// Compare descending-sorted dimension triples, skipping the height slot.
    SortedDimensions,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MatchingCfg {
    /// Fractional tolerance, e.g. 0.10 for ±10 %.
    pub tolerance: f32,
    /// Catalog status string that marks a record as pending.
    pub status_filter: String,
    pub mode: MatchMode,
}

impl Default for MatchingCfg {
    fn default() -> Self {
        Self {
            tolerance: 0.10,
            status_filter: "pending".to_string(),
            mode: MatchMode::Footprint,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Csv,
    Sqlite,
    /// Product export: a JSON array of `product_id` plus `*_mm` dimensions.
    Json,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CatalogCfg {
    pub backend: CatalogBackend,
    /// CSV file, JSON export or SQLite database path.
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Control tick period.
    pub tick_ms: u64,
    /// Stop after this many ticks (0 = run until interrupted).
    pub max_ticks: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            tick_ms: 20,
            max_ticks: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub serial: SerialCfg,
    #[serde(default)]
    pub height: HeightCfg,
    pub camera: CameraCfg,
    #[serde(default)]
    pub motion: MotionCfg,
    pub actuators: Vec<ActuatorEntry>,
    #[serde(default)]
    pub matching: MatchingCfg,
    #[serde(default)]
    pub catalog: CatalogCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub runner: RunnerCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Look up a table entry by `(kind, id)`.
    pub fn actuator(&self, kind: DeviceKind, id: u8) -> Option<&ActuatorEntry> {
        self.actuators
            .iter()
            .find(|a| a.kind() == kind && a.id() == id)
    }

    /// Flipper 2's `clear` setpoint: the only value that unlocks pusher 2.
    pub fn interlock_clear_setpoint(&self) -> Option<u16> {
        match self.actuator(DeviceKind::Flipper, 2) {
            Some(ActuatorEntry::Flipper { clear, .. }) => Some(*clear),
            _ => None,
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }

        // Height
        if !self.height.scale.is_finite() || self.height.scale == 0.0 {
            eyre::bail!("height.scale must be finite and non-zero");
        }
        if !self.height.offset.is_finite() {
            eyre::bail!("height.offset must be finite");
        }
        if !(self.height.max_valid_mm > 0.0) {
            eyre::bail!("height.max_valid_mm must be > 0");
        }
        if self.height.window == 0 {
            eyre::bail!("height.window must be >= 1");
        }

        // Camera
        if !(self.camera.mm_per_pixel > 0.0) {
            eyre::bail!("camera.mm_per_pixel must be > 0");
        }
        if self.camera.frame_width_px == 0 || self.camera.frame_height_px == 0 {
            eyre::bail!("camera.frame_width_px and camera.frame_height_px must be > 0");
        }
        if self.camera.sample_rate_hz == 0 {
            eyre::bail!("camera.sample_rate_hz must be > 0");
        }

        // Motion
        let m = &self.motion;
        if !(m.pusher_max_distance_mm > 0.0) {
            eyre::bail!("motion.pusher_max_distance_mm must be > 0");
        }
        for (key, v) in [
            ("staging_mm", m.staging_mm),
            ("handoff_mm", m.handoff_mm),
            ("full_travel_mm", m.full_travel_mm),
        ] {
            if !(v > 0.0) {
                eyre::bail!("motion.{key} must be > 0");
            }
            if v > m.pusher_max_distance_mm {
                eyre::bail!("motion.{key} must not exceed motion.pusher_max_distance_mm");
            }
        }
        if m.clearance_margin_mm < 0.0 {
            eyre::bail!("motion.clearance_margin_mm must be >= 0");
        }
        if m.flip_dwell_ms > 60 * 1000 {
            eyre::bail!("motion.flip_dwell_ms is unreasonably large (>60s)");
        }

        self.validate_actuators()?;

        // Matching
        if !(self.matching.tolerance >= 0.0 && self.matching.tolerance < 1.0) {
            eyre::bail!("matching.tolerance must be in [0.0, 1.0)");
        }
        if self.matching.status_filter.trim().is_empty() {
            eyre::bail!("matching.status_filter must not be empty");
        }

        // Catalog
        match (self.catalog.backend, &self.catalog.path) {
            (CatalogBackend::Sqlite, None) => {
                eyre::bail!("catalog.path is required for the sqlite backend")
            }
            (CatalogBackend::Json, None) => {
                eyre::bail!("catalog.path is required for the json backend")
            }
            _ => {}
        }

        // Runner
        if self.runner.tick_ms == 0 {
            eyre::bail!("runner.tick_ms must be >= 1");
        }

        Ok(())
    }

    fn validate_actuators(&self) -> eyre::Result<()> {
        let mut keys = HashSet::new();
        let mut servos = HashSet::new();
        for a in &self.actuators {
            if !keys.insert((a.kind(), a.id())) {
                eyre::bail!(
                    "actuators: duplicate entry for {} {}",
                    a.kind().as_str(),
                    a.id()
                );
            }
            if !servos.insert(a.servo()) {
                eyre::bail!("actuators: servo {} is assigned twice", a.servo());
            }
            match *a {
                ActuatorEntry::Pusher { id, mm_per_s, .. } => {
                    if !(mm_per_s.is_finite() && mm_per_s > 0.0) {
                        eyre::bail!("actuators: pusher {id} mm_per_s must be > 0");
                    }
                }
                ActuatorEntry::Flipper {
                    id,
                    clear,
                    enter,
                    exit,
                    ..
                } => {
                    if clear == enter || clear == exit || enter == exit {
                        eyre::bail!("actuators: flipper {id} setpoints must be distinct");
                    }
                }
                _ => {}
            }
        }
        for (kind, id) in REQUIRED_DEVICES {
            if !keys.contains(&(kind, id)) {
                eyre::bail!("actuators: missing {} {}", kind.as_str(), id);
            }
        }
        Ok(())
    }
}

pub fn load_catalog_csv(path: &std::path::Path) -> eyre::Result<Vec<CatalogRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open catalog CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["common_id", "length", "width", "height", "shape", "status"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "catalog CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut rows: Vec<CatalogRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<CatalogRow>().enumerate() {
        match rec {
            Ok(row) => {
                if rows.iter().any(|r| r.common_id == row.common_id) {
                    eyre::bail!(
                        "catalog CSV row {}: duplicate common_id '{}'",
                        idx + 2,
                        row.common_id
                    );
                }
                if row.length < 0.0 || row.width < 0.0 || row.height < 0.0 {
                    eyre::bail!("catalog CSV row {}: dimensions must be >= 0", idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct ProductEntry {
    product_id: Option<String>,
    length_mm: Option<f32>,
    width_mm: Option<f32>,
    height_mm: Option<f32>,
    shape: Option<String>,
    status: Option<String>,
}

/// Load a JSON product export as catalog rows.
///
/// Entries without an id or with a missing dimension are skipped. Entries
/// without a status take `pending_status`.
pub fn load_catalog_json(
    path: &std::path::Path,
    pending_status: &str,
) -> eyre::Result<Vec<CatalogRow>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("open catalog JSON {:?}: {}", path, e))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&text)
        .map_err(|e| eyre::eyre!("catalog JSON {:?} must be an array: {}", path, e))?;

    let mut rows: Vec<CatalogRow> = Vec::new();
    for (idx, value) in entries.into_iter().enumerate() {
        let Ok(entry) = serde_json::from_value::<ProductEntry>(value) else {
            continue;
        };
        let (Some(common_id), Some(length), Some(width), Some(height)) =
            (entry.product_id, entry.length_mm, entry.width_mm, entry.height_mm)
        else {
            continue;
        };
        if rows.iter().any(|r| r.common_id == common_id) {
            eyre::bail!("catalog JSON entry {}: duplicate product_id '{}'", idx, common_id);
        }
        if length < 0.0 || width < 0.0 || height < 0.0 {
            eyre::bail!("catalog JSON entry {}: dimensions must be >= 0", idx);
        }
        rows.push(CatalogRow {
            common_id,
            length,
            width,
            height,
            shape: entry.shape.unwrap_or_else(|| "box".to_string()),
            status: entry.status.unwrap_or_else(|| pending_status.to_string()),
        });
    }
    Ok(rows)
}
