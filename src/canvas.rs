//! In-memory working copy of the painting being edited.
//!
//! Holds the ordered shape collection and the painting name. Insertion
//! order governs nothing semantically but is preserved across save/load
//! round-trips.

use std::collections::HashMap;

use crate::shapes::{Shape, ShapeId, ShapeType};

/// Name given to a fresh, unsaved painting.
pub const DEFAULT_NAME: &str = "My Painting";

/// The canvas state: name plus ordered shapes.
#[derive(Debug, Clone)]
pub struct CanvasState {
    pub name: String,
    shapes: Vec<Shape>,
}

impl CanvasState {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            shapes: Vec::new(),
        }
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Append a shape. Never rejects a well-formed shape.
    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    /// Remove the shape with the given id. Idempotent: removing an absent
    /// id leaves the collection unchanged and is not an error.
    pub fn remove_shape(&mut self, id: &ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| &s.id != id);
        self.shapes.len() != before
    }

    /// Replace the whole collection and the name atomically. Used by New,
    /// Load, and Import.
    pub fn reset(&mut self, name: impl Into<String>, shapes: Vec<Shape>) {
        self.name = name.into();
        self.shapes = shapes;
    }

    /// Return to the blank default state.
    pub fn clear(&mut self) {
        self.reset(DEFAULT_NAME, Vec::new());
    }

    /// Topmost shape under the pointer, if any.
    pub fn shape_at(&self, px: f64, py: f64) -> Option<&Shape> {
        self.shapes.iter().rev().find(|s| s.contains(px, py))
    }

    /// Occurrence count for each of the four shape types, zero included.
    pub fn counts_by_type(&self) -> HashMap<ShapeType, usize> {
        let mut counts: HashMap<ShapeType, usize> =
            ShapeType::ALL.iter().map(|&t| (t, 0)).collect();
        for shape in &self.shapes {
            *counts.entry(shape.shape_type).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::place;

    fn sample(shape_type: ShapeType) -> Shape {
        place(shape_type, "#ff6b6b", 100.0, 100.0, 800.0, 600.0)
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut canvas = CanvasState::new();
        let a = sample(ShapeType::Square);
        let b = sample(ShapeType::Circle);
        canvas.add_shape(a.clone());
        canvas.add_shape(b.clone());
        assert_eq!(canvas.shapes(), &[a, b]);
    }

    #[test]
    fn remove_absent_id_is_a_noop() {
        let mut canvas = CanvasState::new();
        canvas.add_shape(sample(ShapeType::Triangle));
        let before = canvas.shapes().to_vec();
        assert!(!canvas.remove_shape(&ShapeId::from("no-such-id")));
        assert_eq!(canvas.shapes(), before.as_slice());
    }

    #[test]
    fn remove_deletes_exactly_the_matching_shape() {
        let mut canvas = CanvasState::new();
        let a = sample(ShapeType::Square);
        let b = sample(ShapeType::Square);
        canvas.add_shape(a.clone());
        canvas.add_shape(b.clone());
        assert!(canvas.remove_shape(&a.id));
        assert_eq!(canvas.shapes(), &[b]);
    }

    #[test]
    fn surviving_ids_stay_pairwise_distinct() {
        let mut canvas = CanvasState::new();
        for _ in 0..20 {
            canvas.add_shape(sample(ShapeType::Trapezoid));
        }
        let first = canvas.shapes()[0].id.clone();
        canvas.remove_shape(&first);
        let mut ids: Vec<_> = canvas.shapes().iter().map(|s| s.id.clone()).collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();
        assert_eq!(ids.len(), canvas.len());
    }

    #[test]
    fn reset_replaces_name_and_shapes() {
        let mut canvas = CanvasState::new();
        canvas.add_shape(sample(ShapeType::Circle));
        canvas.reset("Sunset", vec![sample(ShapeType::Square)]);
        assert_eq!(canvas.name, "Sunset");
        assert_eq!(canvas.len(), 1);

        canvas.clear();
        assert_eq!(canvas.name, DEFAULT_NAME);
        assert!(canvas.is_empty());
    }

    #[test]
    fn counts_cover_all_types_with_zeros() {
        let mut canvas = CanvasState::new();
        canvas.add_shape(sample(ShapeType::Square));
        canvas.add_shape(sample(ShapeType::Square));
        canvas.add_shape(sample(ShapeType::Circle));

        let counts = canvas.counts_by_type();
        assert_eq!(counts[&ShapeType::Square], 2);
        assert_eq!(counts[&ShapeType::Circle], 1);
        assert_eq!(counts[&ShapeType::Triangle], 0);
        assert_eq!(counts[&ShapeType::Trapezoid], 0);
    }

    #[test]
    fn shape_at_returns_topmost() {
        let mut canvas = CanvasState::new();
        let bottom = sample(ShapeType::Square);
        let top = sample(ShapeType::Circle);
        canvas.add_shape(bottom);
        canvas.add_shape(top.clone());
        let hit = canvas.shape_at(100.0, 100.0).expect("hit");
        assert_eq!(hit.id, top.id);
    }
}
