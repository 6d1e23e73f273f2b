//! Domain values shared between the controller and its collaborators.

use std::fmt;
use std::str::FromStr;

/// Footprint class reported by vision and stored in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shape {
    Box,
    Cylinder,
    #[default]
    Invalid,
}

impl Shape {
    /// Catalog string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Shape::Box => "box",
            Shape::Cylinder => "cylinder",
            Shape::Invalid => "invalid",
        }
    }

    /// Lenient mapping used when reading catalog rows: unknown strings are `Invalid`.
    pub fn from_catalog(s: &str) -> Self {
        s.parse().unwrap_or(Shape::Invalid)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseShapeError(pub String);

impl fmt::Display for ParseShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown shape '{}' (expected box, cylinder or invalid)", self.0)
    }
}

impl std::error::Error for ParseShapeError {}

impl FromStr for Shape {
    type Err = ParseShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box" => Ok(Shape::Box),
            "cylinder" => Ok(Shape::Cylinder),
            "invalid" => Ok(Shape::Invalid),
            other => Err(ParseShapeError(other.to_string())),
        }
    }
}

/// Processing status of a catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetStatus {
    #[default]
    Pending,
    Processed,
}

/// One measurement produced per detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectedObject {
    pub length_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    pub shape: Shape,
    /// Centre in frame pixels.
    pub center_x: f32,
    pub center_y: f32,
    /// Yaw in degrees, (-90, 90].
    pub angle_deg: f32,
}

impl DetectedObject {
    /// Map any angle in degrees into (-90, 90].
    pub fn normalize_angle(deg: f32) -> f32 {
        if !deg.is_finite() {
            return 0.0;
        }
        let mut a = deg % 180.0;
        if a <= -90.0 {
            a += 180.0;
        } else if a > 90.0 {
            a -= 180.0;
        }
        a
    }

    /// Replace the height with the sensor average; `None` leaves the object unchanged.
    pub fn with_height(mut self, height_mm: Option<f32>) -> Self {
        if let Some(h) = height_mm {
            self.height_mm = h.max(0.0);
        }
        self
    }

    /// Distance from the footprint centre to a corner.
    pub fn half_diagonal_mm(&self) -> f32 {
        (self.length_mm / 2.0).hypot(self.width_mm / 2.0)
    }
}

/// A catalog record describing how an object must leave the cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub common_id: String,
    pub length_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
    pub shape: Shape,
    pub status: TargetStatus,
}

/// Raw camera frame, packed BGR.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_string_mapping_is_bidirectional() {
        for s in [Shape::Box, Shape::Cylinder, Shape::Invalid] {
            assert_eq!(s.as_str().parse::<Shape>().unwrap(), s);
        }
        assert_eq!(Shape::from_catalog("BOX"), Shape::Box);
        assert_eq!(Shape::from_catalog("pyramid"), Shape::Invalid);
        assert!("pyramid".parse::<Shape>().is_err());
    }

    #[test]
    fn angles_normalize_into_half_open_range() {
        assert_eq!(DetectedObject::normalize_angle(90.0), 90.0);
        assert_eq!(DetectedObject::normalize_angle(-90.0), 90.0);
        assert_eq!(DetectedObject::normalize_angle(135.0), -45.0);
        assert_eq!(DetectedObject::normalize_angle(-135.0), 45.0);
        assert_eq!(DetectedObject::normalize_angle(30.0), 30.0);
    }

    #[test]
    fn height_fusion_ignores_unknown() {
        let o = DetectedObject {
            height_mm: 12.0,
            ..Default::default()
        };
        assert_eq!(o.with_height(None).height_mm, 12.0);
        assert_eq!(o.with_height(Some(40.5)).height_mm, 40.5);
    }
}
