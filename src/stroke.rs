use serde::{Deserialize, Serialize};

use crate::{
    color::Color,
    error::{ContextError, ErrorKind},
    geometry::NormalizedPoint,
};

/// One finished freehand gesture on a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// The page the stroke was drawn on, starting from 1.
    pub page: u32,
    /// The points of the gesture in the order they were recorded.
    pub points: Vec<NormalizedPoint>,
    pub color: Color,
    /// The thickness of the line, in overlay pixels and PDF units alike.
    pub width: f32,
}

impl Stroke {
    /// Only strokes with at least one segment end up on screen or in the document.
    pub fn is_drawable(&self) -> bool {
        self.points.len() >= 2
    }

    /// Checks what the recorder guarantees on its own, for strokes coming from elsewhere.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.page == 0 {
            return Err(ContextError::with_context(
                ErrorKind::InvalidInput,
                "Stroke pages are numbered from 1",
            ));
        }
        if self.points.is_empty() {
            return Err(ContextError::with_context(
                ErrorKind::InvalidInput,
                format!("Stroke on page {} has no points", self.page),
            ));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(ContextError::with_context(
                ErrorKind::InvalidInput,
                format!("Stroke on page {} has an invalid width {}", self.page, self.width),
            ));
        }
        if let Some(point) = self.points.iter().find(|point| !point.is_in_unit_square()) {
            return Err(ContextError::with_context(
                ErrorKind::InvalidInput,
                format!(
                    "Stroke on page {} has the point ({}, {}) outside of the page",
                    self.page, point.x, point.y
                ),
            ));
        }

        Ok(())
    }
}

/// The strokes of a grading session, in the order they were drawn.
///
/// The order doubles as the undo order. Strokes are never edited once appended; they only
/// leave the list through `undo_on_page`, `clear_page` or `clear_all`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeList {
    strokes: Vec<Stroke>,
}

impl StrokeList {
    pub fn new() -> Self {
        StrokeList::default()
    }

    /// Validates the strokes and collects them in the given order.
    pub fn from_strokes(strokes: Vec<Stroke>) -> Result<Self, ContextError> {
        let mut stroke_list = StrokeList::new();
        for stroke in strokes {
            stroke_list.push(stroke)?;
        }

        Ok(stroke_list)
    }

    /// Reads a JSON array of strokes, validating each of them.
    pub fn from_json(json: &[u8]) -> Result<Self, ContextError> {
        let strokes: Vec<Stroke> = serde_json::from_slice(json).map_err(|error| {
            ContextError::with_error(ErrorKind::InvalidInput, "Unable to parse the strokes", &error)
        })?;

        StrokeList::from_strokes(strokes)
    }

    pub fn push(&mut self, stroke: Stroke) -> Result<(), ContextError> {
        stroke.validate()?;
        self.strokes.push(stroke);

        Ok(())
    }

    /// Removes the most recent stroke drawn on `page`, leaving strokes of other pages alone
    /// even when they are more recent.
    pub fn undo_on_page(&mut self, page: u32) -> Option<Stroke> {
        let index = self.strokes.iter().rposition(|stroke| stroke.page == page)?;
        Some(self.strokes.remove(index))
    }

    /// Removes every stroke of `page` and returns how many were removed.
    pub fn clear_page(&mut self, page: u32) -> usize {
        let before = self.strokes.len();
        self.strokes.retain(|stroke| stroke.page != page);
        before - self.strokes.len()
    }

    pub fn clear_all(&mut self) {
        self.strokes.clear();
    }

    /// The strokes of one page, oldest first.
    pub fn on_page(&self, page: u32) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter().filter(move |stroke| stroke.page == page)
    }

    /// The distinct pages carrying at least one stroke, in ascending order.
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.strokes.iter().map(|stroke| stroke.page).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stroke> {
        self.strokes.iter()
    }

    pub fn as_slice(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn into_vec(self) -> Vec<Stroke> {
        self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

impl<'a> IntoIterator for &'a StrokeList {
    type Item = &'a Stroke;
    type IntoIter = std::slice::Iter<'a, Stroke>;

    fn into_iter(self) -> Self::IntoIter {
        self.strokes.iter()
    }
}
