use crate::{
    color::Color,
    geometry::{to_screen, NormalizedPoint, ScreenPoint, SurfaceGeometry},
    recorder::LiveSegment,
    stroke::StrokeList,
};

/// Whatever renders the PDF page underneath the overlay.
pub trait PageBoundsSource {
    /// The box of the rendered page relative to the container, once the renderer can tell.
    fn page_bounds(&self, page: u32) -> Option<SurfaceGeometry>;

    /// The box of the container itself, used while the page box is unknown.
    fn container_bounds(&self) -> SurfaceGeometry;
}

/// The events after which the overlay has to follow the page again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealignTrigger {
    PageChanged,
    Resized,
    RenderComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Round,
}

/// How a polyline is stroked on the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineStyle {
    pub color: Color,
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
}

impl LineStyle {
    pub fn new(color: Color, width: f32) -> Self {
        LineStyle {
            color,
            width,
            cap: LineCap::Round,
            join: LineJoin::Round,
        }
    }
}

/// A transparent surface the overlay paints onto, in its own pixel space.
pub trait DrawingTarget {
    fn resize(&mut self, width: f32, height: f32);
    fn clear(&mut self);
    fn polyline(&mut self, points: &[ScreenPoint], style: LineStyle);
}

/// A single painting command recorded by a `DisplayList`.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Polyline {
        points: Vec<ScreenPoint>,
        style: LineStyle,
    },
}

/// A drawing target that keeps the commands instead of rasterizing them, for headless use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    pub width: f32,
    pub height: f32,
    pub commands: Vec<DrawCommand>,
}

impl DisplayList {
    /// The polylines painted since the last clear.
    pub fn visible_polylines(&self) -> Vec<&[ScreenPoint]> {
        let start = self
            .commands
            .iter()
            .rposition(|command| *command == DrawCommand::Clear)
            .map_or(0, |index| index + 1);

        self.commands[start..]
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
                DrawCommand::Clear => None,
            })
            .collect()
    }
}

impl DrawingTarget for DisplayList {
    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn polyline(&mut self, points: &[ScreenPoint], style: LineStyle) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            style,
        });
    }
}

/// Keeps the drawing surface on top of the rendered page and paints the strokes of the
/// active page onto it.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    geometry: Option<SurfaceGeometry>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        OverlayRenderer::default()
    }

    /// The current geometry of the surface, `None` until the first realignment.
    pub fn geometry(&self) -> Option<SurfaceGeometry> {
        self.geometry
    }

    /// Recomputes the surface geometry from the rendered page, falling back to the whole
    /// container while the page box is not available. Returns whether the geometry changed,
    /// so repeated triggers with the same layout cost nothing further.
    pub fn realign(&mut self, trigger: RealignTrigger, page: u32, source: &dyn PageBoundsSource) -> bool {
        let geometry = match source.page_bounds(page).filter(SurfaceGeometry::is_ready) {
            Some(page_bounds) => page_bounds,
            None => {
                let container = source.container_bounds();
                log::debug!(
                    "Page {} has no rendered box yet, fitting the overlay to the container {}x{}",
                    page,
                    container.width,
                    container.height
                );
                SurfaceGeometry::sized(container.width, container.height)
            }
        };

        if self.geometry == Some(geometry) {
            return false;
        }
        log::debug!("Realigned the overlay after {:?} to {:?}", trigger, geometry);
        self.geometry = Some(geometry);
        true
    }

    /// Clears the surface and paints every drawable stroke of `page`.
    pub fn repaint(&self, strokes: &StrokeList, page: u32, target: &mut dyn DrawingTarget) {
        let Some(geometry) = self.geometry else {
            return;
        };
        target.resize(geometry.width, geometry.height);
        target.clear();
        if !geometry.is_ready() {
            log::warn!("Skipping the repaint of page {} on a surface without size", page);
            return;
        }

        for stroke in strokes.on_page(page).filter(|stroke| stroke.is_drawable()) {
            let points = surface_path(&stroke.points, &geometry);
            target.polyline(&points, LineStyle::new(stroke.color, stroke.width));
        }
    }

    /// Paints the segment just recorded, through the same mapping used by `repaint`.
    pub fn draw_live_segment(&self, segment: &LiveSegment, target: &mut dyn DrawingTarget) {
        let Some(geometry) = self.geometry.filter(SurfaceGeometry::is_ready) else {
            return;
        };
        let points = surface_path(&[segment.from, segment.to], &geometry);
        target.polyline(&points, LineStyle::new(segment.color, segment.width));
    }
}

/// Maps normalized points to the pixel space of the surface itself.
fn surface_path(points: &[NormalizedPoint], geometry: &SurfaceGeometry) -> Vec<ScreenPoint> {
    let local = geometry.local();
    points.iter().map(|point| to_screen(*point, &local)).collect()
}
