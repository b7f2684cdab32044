use crate::{
    color::Color,
    geometry::{to_normalized, NormalizedPoint, ScreenPoint, SurfaceGeometry},
    stroke::Stroke,
};

/// What a pointer drag does on the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Drags record strokes.
    #[default]
    Pen,
    /// Drags record nothing; strokes are removed through undo and clear instead.
    Eraser,
    /// Drags record nothing and are left to the page viewer.
    Pan,
}

/// The color and thickness stamped on every new stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenSettings {
    pub color: Color,
    pub width: f32,
}

impl Default for PenSettings {
    fn default() -> Self {
        PenSettings {
            color: Color::RED,
            width: 2.0,
        }
    }
}

/// The segment just added by a pointer move, to be drawn right away as feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveSegment {
    pub from: NormalizedPoint,
    pub to: NormalizedPoint,
    pub color: Color,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
enum RecorderState {
    Idle,
    Drawing {
        page: u32,
        pen: PenSettings,
        points: Vec<NormalizedPoint>,
    },
}

/// Turns pointer gestures on the overlay into strokes.
///
/// A gesture begins on pointer down, grows with each move and is finalized by either the
/// pointer going up or leaving the surface, so that a drag running off the page is kept.
#[derive(Debug, Clone)]
pub struct StrokeRecorder {
    tool: Tool,
    pen: PenSettings,
    state: RecorderState,
}

impl Default for StrokeRecorder {
    fn default() -> Self {
        StrokeRecorder::new(PenSettings::default())
    }
}

impl StrokeRecorder {
    pub fn new(pen: PenSettings) -> Self {
        StrokeRecorder {
            tool: Tool::Pen,
            pen,
            state: RecorderState::Idle,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn pen(&self) -> PenSettings {
        self.pen
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, RecorderState::Drawing { .. })
    }

    /// Changing the pen only affects the strokes started afterwards.
    pub fn set_pen(&mut self, pen: PenSettings) {
        self.pen = pen;
    }

    /// Switches tool, finalizing the gesture in progress, if any.
    pub fn set_tool(&mut self, tool: Tool) -> Option<Stroke> {
        let finished = self.pointer_up();
        self.tool = tool;
        finished
    }

    /// Starts a gesture on `page` when the pen is active and the surface has been laid out.
    ///
    /// Returns whether a stroke is now being recorded, along with the gesture that was still in
    /// progress, if any. A pointer down without the matching pointer up finishes that gesture
    /// rather than discarding it.
    pub fn pointer_down(
        &mut self,
        page: u32,
        point: ScreenPoint,
        surface: &SurfaceGeometry,
    ) -> (bool, Option<Stroke>) {
        let unfinished = self.pointer_up();
        if self.tool != Tool::Pen {
            return (false, unfinished);
        }
        let Some(first_point) = to_normalized(point, surface) else {
            log::warn!("Ignoring a gesture on page {} before the surface is laid out", page);
            return (false, unfinished);
        };

        self.state = RecorderState::Drawing {
            page,
            pen: self.pen,
            points: vec![first_point],
        };
        (true, unfinished)
    }

    /// Extends the gesture in progress, returning the new segment for immediate drawing.
    pub fn pointer_move(&mut self, point: ScreenPoint, surface: &SurfaceGeometry) -> Option<LiveSegment> {
        let RecorderState::Drawing { pen, points, .. } = &mut self.state else {
            return None;
        };
        let next_point = to_normalized(point, surface)?;
        let last_point = *points.last()?;
        points.push(next_point);

        Some(LiveSegment {
            from: last_point,
            to: next_point,
            color: pen.color,
            width: pen.width,
        })
    }

    /// Finalizes the gesture in progress into a stroke.
    pub fn pointer_up(&mut self) -> Option<Stroke> {
        match std::mem::replace(&mut self.state, RecorderState::Idle) {
            RecorderState::Drawing { page, pen, points } if !points.is_empty() => {
                log::debug!("Recorded a stroke of {} points on page {}", points.len(), page);
                Some(Stroke {
                    page,
                    points,
                    color: pen.color,
                    width: pen.width,
                })
            }
            _ => None,
        }
    }

    /// Leaving the surface mid-gesture finishes the gesture exactly like releasing the pointer.
    pub fn pointer_leave(&mut self) -> Option<Stroke> {
        self.pointer_up()
    }
}
