use time::OffsetDateTime;

use crate::{
    compositor::compose_with_report,
    error::{ContextError, ErrorKind},
    gateway::PersistenceGateway,
    geometry::{ScreenPoint, SurfaceGeometry},
    overlay::{DrawingTarget, OverlayRenderer, PageBoundsSource, RealignTrigger},
    record::{GradingRecord, GradingUpdate},
    recorder::{PenSettings, StrokeRecorder, Tool},
    stroke::{Stroke, StrokeList},
};

/// The review of one submission: the ink drawn on its pages, the marks and feedback being
/// typed, and the save that persists all of it.
///
/// Pointer positions are expressed in the frame of the page container, the same frame the
/// page viewer reports the page box in.
#[derive(Debug, Clone)]
pub struct GradingSession {
    record: GradingRecord,
    strokes: StrokeList,
    recorder: StrokeRecorder,
    overlay: OverlayRenderer,
    active_page: u32,
    page_count: Option<u32>,
    marks: String,
    feedback: String,
    repaint_requested: bool,
}

impl GradingSession {
    /// Opens the review of a record, prefilling the form with what was saved last time.
    pub fn new(record: GradingRecord, pen: PenSettings) -> Self {
        let marks = record
            .marks_awarded
            .map(|marks_awarded| marks_awarded.to_string())
            .unwrap_or_default();
        let feedback = record.feedback.clone().unwrap_or_default();

        GradingSession {
            record,
            strokes: StrokeList::new(),
            recorder: StrokeRecorder::new(pen),
            overlay: OverlayRenderer::new(),
            active_page: 1,
            page_count: None,
            marks,
            feedback,
            repaint_requested: true,
        }
    }

    pub fn record(&self) -> &GradingRecord {
        &self.record
    }

    pub fn strokes(&self) -> &StrokeList {
        &self.strokes
    }

    pub fn active_page(&self) -> u32 {
        self.active_page
    }

    /// The number of pages of the document, once it has loaded.
    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn surface_geometry(&self) -> Option<SurfaceGeometry> {
        self.overlay.geometry()
    }

    pub fn marks(&self) -> &str {
        &self.marks
    }

    pub fn set_marks(&mut self, marks: impl Into<String>) {
        self.marks = marks.into();
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn set_feedback(&mut self, feedback: impl Into<String>) {
        self.feedback = feedback.into();
    }

    pub fn tool(&self) -> Tool {
        self.recorder.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if let Some(stroke) = self.recorder.set_tool(tool) {
            self.append(stroke);
        }
    }

    pub fn pen(&self) -> PenSettings {
        self.recorder.pen()
    }

    pub fn set_pen(&mut self, pen: PenSettings) -> Result<(), ContextError> {
        if !(pen.width.is_finite() && pen.width > 0.0) {
            return Err(ContextError::with_context(
                ErrorKind::InvalidInput,
                format!("The pen width must be positive, not {}", pen.width),
            ));
        }
        self.recorder.set_pen(pen);

        Ok(())
    }

    /// Called once the viewer knows how many pages the document has.
    pub fn document_loaded(&mut self, page_count: u32, viewer: &dyn PageBoundsSource) {
        self.page_count = Some(page_count);
        let active_page = self.active_page.clamp(1, page_count.max(1));
        self.show_page(active_page, viewer);
    }

    /// Shows the given page, as long as the document has it. Returns whether the page changed.
    pub fn go_to_page(&mut self, page: u32, viewer: &dyn PageBoundsSource) -> bool {
        let last_page = self.page_count.unwrap_or(u32::MAX);
        if page == 0 || page > last_page || page == self.active_page {
            return false;
        }
        self.show_page(page, viewer);
        true
    }

    pub fn next_page(&mut self, viewer: &dyn PageBoundsSource) -> bool {
        self.go_to_page(self.active_page.saturating_add(1), viewer)
    }

    pub fn previous_page(&mut self, viewer: &dyn PageBoundsSource) -> bool {
        self.go_to_page(self.active_page.saturating_sub(1), viewer)
    }

    /// Follows the page again after the layout changed or the page finished rendering.
    pub fn realign(&mut self, trigger: RealignTrigger, viewer: &dyn PageBoundsSource) {
        if self.overlay.realign(trigger, self.active_page, viewer) {
            self.repaint_requested = true;
        }
    }

    pub fn pointer_down(&mut self, point: ScreenPoint) -> bool {
        let surface = self.overlay.geometry().unwrap_or_default();
        let (started, unfinished) = self.recorder.pointer_down(self.active_page, point, &surface);
        if let Some(stroke) = unfinished {
            self.append(stroke);
        }
        started
    }

    /// Extends the stroke being drawn and paints the new segment right away.
    pub fn pointer_move(&mut self, point: ScreenPoint, target: &mut dyn DrawingTarget) {
        let surface = self.overlay.geometry().unwrap_or_default();
        if let Some(segment) = self.recorder.pointer_move(point, &surface) {
            self.overlay.draw_live_segment(&segment, target);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(stroke) = self.recorder.pointer_up() {
            self.append(stroke);
        }
    }

    pub fn pointer_leave(&mut self) {
        if let Some(stroke) = self.recorder.pointer_leave() {
            self.append(stroke);
        }
    }

    /// Removes the latest stroke of the active page.
    pub fn undo(&mut self) -> Option<Stroke> {
        let stroke = self.strokes.undo_on_page(self.active_page)?;
        self.repaint_requested = true;
        Some(stroke)
    }

    /// Removes every stroke of the active page.
    pub fn clear_page(&mut self) -> usize {
        let removed = self.strokes.clear_page(self.active_page);
        if removed > 0 {
            self.repaint_requested = true;
        }
        removed
    }

    pub fn clear_all(&mut self) {
        self.strokes.clear_all();
        self.repaint_requested = true;
    }

    /// Adds strokes recorded elsewhere after the ones drawn in this session.
    pub fn import_strokes(&mut self, strokes: StrokeList) {
        for stroke in strokes.into_vec() {
            self.append(stroke);
        }
    }

    /// Repaints the overlay if anything it shows has changed. Returns whether it did.
    pub fn paint(&mut self, target: &mut dyn DrawingTarget) -> bool {
        if !self.repaint_requested || self.overlay.geometry().is_none() {
            return false;
        }
        self.overlay.repaint(&self.strokes, self.active_page, target);
        self.repaint_requested = false;
        true
    }

    /// Persists the review. When ink has been drawn, the latest version of the document is
    /// fetched, the ink burned into it and the result uploaded; the record is then updated
    /// with the marks, the feedback and the new document whether or not there was any ink.
    ///
    /// On failure nothing of the session is lost, so the save can simply be retried. On
    /// success the ink lives in the new annotated document, which is where the next save
    /// starts from, so the strokes are cleared.
    ///
    /// The exclusive borrow keeps a second save from starting while this one runs.
    pub fn save(
        &mut self,
        gateway: &dyn PersistenceGateway,
        reviewer: &str,
    ) -> Result<&GradingRecord, ContextError> {
        self.pointer_up();
        let marks_awarded = parse_marks(&self.marks)?;
        let submission_id = self.record.submission_id.clone();

        let mut annotated_pdf_url = self.record.annotated_pdf_url.clone();
        if !self.strokes.is_empty() {
            let source_url = self.record.source_url();
            log::info!("Fetching the document to annotate from {}", source_url);
            let source_pdf_bytes = gateway.fetch_document(source_url)?;

            log::info!("Burning {} strokes into the document", self.strokes.len());
            let (pdf_bytes, report) = compose_with_report(&source_pdf_bytes, self.strokes.as_slice())?;
            if report.strokes_drawn > 0 {
                let file_name = format!("graded-{}.pdf", submission_id);
                let uploaded_url = gateway.upload_document(&file_name, &pdf_bytes)?;
                log::info!("Uploaded the annotated document to {}", uploaded_url);
                annotated_pdf_url = Some(uploaded_url);
            } else {
                log::warn!("None of the strokes fit the document, nothing was uploaded");
            }
        }

        let update = GradingUpdate::reviewed(marks_awarded, &self.feedback, annotated_pdf_url);
        let record = gateway.update_record(&submission_id, &update, reviewer, OffsetDateTime::now_utc())?;
        log::info!("Saved the review of the submission {:?}", submission_id);

        self.record = record;
        self.strokes.clear_all();
        self.repaint_requested = true;

        Ok(&self.record)
    }

    fn show_page(&mut self, page: u32, viewer: &dyn PageBoundsSource) {
        self.pointer_up();
        self.active_page = page;
        self.overlay.realign(RealignTrigger::PageChanged, page, viewer);
        self.repaint_requested = true;
    }

    fn append(&mut self, stroke: Stroke) {
        let page = stroke.page;
        match self.strokes.push(stroke) {
            Ok(()) => {
                if page == self.active_page {
                    self.repaint_requested = true;
                }
            }
            Err(error) => log::warn!("Discarding a stroke on page {}: {}", page, error),
        }
    }
}

/// Reads the marks field: blank means no marks, anything else must be a finite number.
fn parse_marks(marks: &str) -> Result<Option<f64>, ContextError> {
    let marks = marks.trim();
    if marks.is_empty() {
        return Ok(None);
    }

    match marks.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        Ok(_) => Err(ContextError::with_context(
            ErrorKind::InvalidInput,
            format!("The marks {:?} are not a finite number", marks),
        )),
        Err(error) => Err(ContextError::with_error(
            ErrorKind::InvalidInput,
            format!("The marks {:?} are not a number", marks),
            &error,
        )),
    }
}
