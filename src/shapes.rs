//! Shape types and placement logic for easel.
//!
//! A shape is a fixed-size colored primitive placed on a bounded canvas.
//! Placement clamps the drop position so the whole shape stays inside the
//! canvas.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed size of every placed shape, in canvas units.
pub const SHAPE_SIZE: f64 = 50.0;

/// Shape identifier.
///
/// Generated locally as a UUID string so rapid successive drops can never
/// collide. Older exports carried numeric ids, so deserialization accepts
/// either a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ShapeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) => ShapeId(n.to_string()),
            Raw::Str(s) => ShapeId(s),
        })
    }
}

/// The four shape types a painting can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Square,
    Circle,
    Triangle,
    Trapezoid,
}

impl ShapeType {
    pub const ALL: [ShapeType; 4] = [
        ShapeType::Square,
        ShapeType::Circle,
        ShapeType::Triangle,
        ShapeType::Trapezoid,
    ];

    /// Get display name for the sidebar and footer
    pub fn name(self) -> &'static str {
        match self {
            ShapeType::Square => "Square",
            ShapeType::Circle => "Circle",
            ShapeType::Triangle => "Triangle",
            ShapeType::Trapezoid => "Trapezoid",
        }
    }

    /// Parse a drop payload type name. Unknown names yield no shape.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "square" => Some(ShapeType::Square),
            "circle" => Some(ShapeType::Circle),
            "triangle" => Some(ShapeType::Triangle),
            "trapezoid" => Some(ShapeType::Trapezoid),
            _ => None,
        }
    }

    /// Cycle to next shape type
    pub fn next(self) -> Self {
        match self {
            ShapeType::Square => ShapeType::Circle,
            ShapeType::Circle => ShapeType::Triangle,
            ShapeType::Triangle => ShapeType::Trapezoid,
            ShapeType::Trapezoid => ShapeType::Square,
        }
    }
}

/// A placed shape: typed, colored, positioned by its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    #[serde(rename = "type")]
    pub shape_type: ShapeType,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

impl Shape {
    /// Hit test against the shape's bounding box.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.x + SHAPE_SIZE && py >= self.y && py < self.y + SHAPE_SIZE
    }
}

/// One-shot payload delivered by a drop gesture.
#[derive(Debug, Clone)]
pub struct DropPayload {
    pub shape_type: String,
    pub color: String,
}

/// Compute the placement of a shape dropped with the pointer at its center.
///
/// The top-left corner is clamped per axis to `[0, dimension - SHAPE_SIZE]`
/// so the whole shape stays inside the canvas. Total over the four known
/// types; rejection of unknown type names happens at payload parse time.
pub fn place(
    shape_type: ShapeType,
    color: &str,
    pointer_x: f64,
    pointer_y: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> Shape {
    let x = (pointer_x - SHAPE_SIZE / 2.0)
        .min(canvas_width - SHAPE_SIZE)
        .max(0.0);
    let y = (pointer_y - SHAPE_SIZE / 2.0)
        .min(canvas_height - SHAPE_SIZE)
        .max(0.0);

    Shape {
        id: ShapeId::new(),
        shape_type,
        x,
        y,
        color: color.to_string(),
    }
}

/// Place a shape from a raw drop payload. Returns `None` when the payload
/// names an unrecognized shape type.
pub fn place_drop(
    payload: &DropPayload,
    pointer_x: f64,
    pointer_y: f64,
    canvas_width: f64,
    canvas_height: f64,
) -> Option<Shape> {
    let shape_type = ShapeType::parse(&payload.shape_type)?;
    Some(place(
        shape_type,
        &payload.color,
        pointer_x,
        pointer_y,
        canvas_width,
        canvas_height,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn placement_centers_on_pointer() {
        let shape = place(ShapeType::Square, "#ff6b6b", 100.0, 100.0, 800.0, 600.0);
        assert_eq!(shape.x, 75.0);
        assert_eq!(shape.y, 75.0);
    }

    #[test]
    fn placement_clamps_each_axis_independently() {
        let shape = place(ShapeType::Circle, "#4ecdc4", 0.0, 599.0, 800.0, 600.0);
        assert_eq!(shape.x, 0.0);
        assert_eq!(shape.y, 550.0);
    }

    #[test]
    fn successive_placements_get_distinct_ids() {
        let a = place(ShapeType::Square, "#ff6b6b", 10.0, 10.0, 800.0, 600.0);
        let b = place(ShapeType::Square, "#ff6b6b", 10.0, 10.0, 800.0, 600.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn drop_payload_with_unknown_type_is_rejected() {
        let payload = DropPayload {
            shape_type: "hexagon".to_string(),
            color: "#ff6b6b".to_string(),
        };
        assert!(place_drop(&payload, 50.0, 50.0, 800.0, 600.0).is_none());
    }

    #[test]
    fn shape_id_accepts_numeric_json_ids() {
        let shape: Shape = serde_json::from_str(
            r##"{"id": 1718000000000, "type": "square", "x": 10.0, "y": 20.0, "color": "#ff6b6b"}"##,
        )
        .unwrap();
        assert_eq!(shape.id.as_str(), "1718000000000");
    }

    proptest! {
        #[test]
        fn placed_shape_stays_inside_canvas(
            px in -500.0f64..1500.0,
            py in -500.0f64..1500.0,
            w in 50.0f64..2000.0,
            h in 50.0f64..2000.0,
        ) {
            let shape = place(ShapeType::Trapezoid, "#45b7d1", px, py, w, h);
            prop_assert!(shape.x >= 0.0 && shape.x <= w - SHAPE_SIZE);
            prop_assert!(shape.y >= 0.0 && shape.y <= h - SHAPE_SIZE);
        }
    }
}
