use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// A point expressed as a fraction of the rendered page, `(0, 0)` being the top-left corner
/// and `(1, 1)` the bottom-right one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        NormalizedPoint { x, y }
    }

    /// Whether both coordinates are finite and inside the unit square.
    pub fn is_in_unit_square(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    fn clamped(self) -> Self {
        NormalizedPoint {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }
}

/// A point in the pixel space of the screen, or of the overlay when the surface sits at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        ScreenPoint { x, y }
    }
}

/// Position and size of the drawing surface, recomputed whenever the page, the layout or
/// the page render changes and then handed to the code that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SurfaceGeometry {
    /// Offset of the surface from the left of the reference frame (usually the page container).
    pub left: f32,
    /// Offset of the surface from the top of the reference frame.
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceGeometry {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        SurfaceGeometry {
            left,
            top,
            width,
            height,
        }
    }

    /// A surface of the given size sitting at the origin.
    pub fn sized(width: f32, height: f32) -> Self {
        SurfaceGeometry::new(0.0, 0.0, width, height)
    }

    /// The same surface seen from its own top-left corner, which is the frame the overlay paints in.
    pub fn local(&self) -> Self {
        SurfaceGeometry::sized(self.width, self.height)
    }

    /// A surface is ready once it has been laid out with a finite, non-zero size.
    pub fn is_ready(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Converts a screen point into the unit square of the surface. Points beyond the edges of
/// the surface are clamped onto them.
///
/// Returns `None` while the surface has no usable size, so that nothing is ever recorded
/// against a page which has not been laid out yet.
pub fn to_normalized(point: ScreenPoint, surface: &SurfaceGeometry) -> Option<NormalizedPoint> {
    if !surface.is_ready() || !point.x.is_finite() || !point.y.is_finite() {
        return None;
    }

    let normalized = NormalizedPoint {
        x: (point.x - surface.left) / surface.width,
        y: (point.y - surface.top) / surface.height,
    };
    Some(normalized.clamped())
}

/// The inverse of `to_normalized`.
pub fn to_screen(point: NormalizedPoint, surface: &SurfaceGeometry) -> ScreenPoint {
    ScreenPoint {
        x: surface.left + point.x * surface.width,
        y: surface.top + point.y * surface.height,
    }
}

/// The visible box of a PDF page in its native units, whose origin lies at the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    /// US Letter, used when a page declares no box at all.
    pub const LETTER: PageBox = PageBox {
        left: 0.0,
        bottom: 0.0,
        width: 612.0,
        height: 792.0,
    };

    /// Builds the box from the `[llx lly urx ury]` rectangle of a PDF dictionary, whose
    /// corners may come in any order.
    pub fn from_rectangle([x0, y0, x1, y1]: [f32; 4]) -> Self {
        PageBox {
            left: x0.min(x1),
            bottom: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// The affine transform from the normalized space onto the page. The vertical axis is
    /// inverted because the page origin is at the bottom while the normalized one is at the top.
    #[rustfmt::skip]
    pub fn transform(&self) -> glm::Mat3 {
        glm::mat3(
            self.width, 0.0, self.left,
            0.0, -self.height, self.bottom + self.height,
            0.0, 0.0, 1.0,
        )
    }

    /// Maps a normalized point onto the page, in document units.
    pub fn to_document(&self, point: NormalizedPoint) -> [f32; 2] {
        let mapped = self.transform() * glm::vec3(point.x, point.y, 1.0);
        [mapped.x, mapped.y]
    }
}
