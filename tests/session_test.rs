mod common;

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use common::{drawn_paths, letter_pdf, page_operations};
use gradeink::{
    color::Color,
    error::{ContextError, ErrorKind},
    gateway::PersistenceGateway,
    geometry::{NormalizedPoint, ScreenPoint, SurfaceGeometry},
    overlay::{DisplayList, PageBoundsSource},
    record::{GradingRecord, GradingUpdate, ReviewStatus},
    recorder::PenSettings,
    session::GradingSession,
    stroke::{Stroke, StrokeList},
};
use time::OffsetDateTime;

const SUBMISSION_URL: &str = "memory://submissions/s-1.pdf";

/// A gateway keeping everything in memory, with switches to make each step fail.
#[derive(Default)]
struct MemoryGateway {
    documents: RefCell<HashMap<String, Vec<u8>>>,
    records: RefCell<HashMap<String, GradingRecord>>,
    fetched_urls: RefCell<Vec<String>>,
    uploads: Cell<usize>,
    fail_fetch: Cell<bool>,
    fail_upload: Cell<bool>,
    fail_update: Cell<bool>,
}

impl MemoryGateway {
    fn with_submission(page_count: usize) -> Self {
        let gateway = MemoryGateway::default();
        gateway
            .documents
            .borrow_mut()
            .insert(SUBMISSION_URL.to_string(), letter_pdf(page_count));
        gateway.records.borrow_mut().insert(
            "s-1".to_string(),
            GradingRecord::submitted("s-1", SUBMISSION_URL),
        );
        gateway
    }

    fn stored_record(&self) -> GradingRecord {
        self.records.borrow()["s-1"].clone()
    }

    fn document(&self, url: &str) -> Vec<u8> {
        self.documents.borrow()[url].clone()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn fetch_document(&self, url: &str) -> Result<Vec<u8>, ContextError> {
        self.fetched_urls.borrow_mut().push(url.to_string());
        if self.fail_fetch.get() {
            return Err(ContextError::with_context(ErrorKind::Transport, "The network is down"));
        }
        self.documents.borrow().get(url).cloned().ok_or_else(|| {
            ContextError::with_context(ErrorKind::Transport, format!("Nothing at {}", url))
        })
    }

    fn upload_document(&self, file_name: &str, pdf_bytes: &[u8]) -> Result<String, ContextError> {
        if self.fail_upload.get() {
            return Err(ContextError::with_context(ErrorKind::Transport, "The upload timed out"));
        }
        self.uploads.set(self.uploads.get() + 1);
        let url = format!("memory://uploads/{}/{}", self.uploads.get(), file_name);
        self.documents.borrow_mut().insert(url.clone(), pdf_bytes.to_vec());
        Ok(url)
    }

    fn load_record(&self, submission_id: &str) -> Result<GradingRecord, ContextError> {
        self.records
            .borrow()
            .get(submission_id)
            .cloned()
            .ok_or_else(|| ContextError::with_context(ErrorKind::NotFound, submission_id))
    }

    fn update_record(
        &self,
        submission_id: &str,
        update: &GradingUpdate,
        reviewer: &str,
        reviewed_at: OffsetDateTime,
    ) -> Result<GradingRecord, ContextError> {
        if self.fail_update.get() {
            return Err(ContextError::with_context(ErrorKind::Persistence, "The database is locked"));
        }
        let mut records = self.records.borrow_mut();
        let record = records
            .get_mut(submission_id)
            .ok_or_else(|| ContextError::with_context(ErrorKind::NotFound, submission_id))?;
        record.apply(update, reviewer, reviewed_at);
        Ok(record.clone())
    }
}

/// A viewer showing every page in a 612 by 792 box, offset inside its container.
struct FakeViewer;

impl PageBoundsSource for FakeViewer {
    fn page_bounds(&self, _page: u32) -> Option<SurfaceGeometry> {
        Some(SurfaceGeometry::new(40.0, 10.0, 612.0, 792.0))
    }

    fn container_bounds(&self) -> SurfaceGeometry {
        SurfaceGeometry::sized(700.0, 900.0)
    }
}

fn open_session(gateway: &MemoryGateway, page_count: u32) -> GradingSession {
    let record = gateway.load_record("s-1").unwrap();
    let mut session = GradingSession::new(record, PenSettings::default());
    session.document_loaded(page_count, &FakeViewer);
    session
}

/// Drags the pen across the page, in container coordinates.
fn drag(session: &mut GradingSession, points: &[(f32, f32)]) {
    let mut display_list = DisplayList::default();
    session.pointer_down(ScreenPoint::new(points[0].0, points[0].1));
    for (x, y) in &points[1..] {
        session.pointer_move(ScreenPoint::new(*x, *y), &mut display_list);
    }
    session.pointer_up();
}

#[test]
fn saving_ink_without_marks_uploads_the_annotated_document() {
    let gateway = MemoryGateway::with_submission(2);
    let mut session = open_session(&gateway, 2);
    drag(&mut session, &[(40.0, 10.0), (346.0, 406.0)]);
    session.set_feedback("See the margin notes");

    let record = session.save(&gateway, "ms-lee").unwrap().clone();

    assert_eq!(record.status, ReviewStatus::Reviewed);
    assert_eq!(record.marks_awarded, None);
    assert_eq!(record.feedback.as_deref(), Some("See the margin notes"));
    assert_eq!(record.reviewed_by.as_deref(), Some("ms-lee"));
    assert_eq!(record.pdf_url, SUBMISSION_URL);
    let annotated_pdf_url = record.annotated_pdf_url.clone().unwrap();
    assert_eq!(annotated_pdf_url, "memory://uploads/1/graded-s-1.pdf");
    similar_asserts::assert_eq!(gateway.stored_record(), record);

    let pages = page_operations(&gateway.document(&annotated_pdf_url));
    let paths = drawn_paths(&pages[0]);
    assert_eq!(paths.len(), 1);
    assert!((paths[0][0][0] - 0.0).abs() < 0.05 && (paths[0][0][1] - 792.0).abs() < 0.05);
    assert!((paths[0][1][0] - 306.0).abs() < 0.05 && (paths[0][1][1] - 396.0).abs() < 0.05);
    assert!(drawn_paths(&pages[1]).is_empty());

    assert!(session.strokes().is_empty());
}

#[test]
fn saving_without_ink_only_updates_the_record() {
    let gateway = MemoryGateway::with_submission(1);
    let mut session = open_session(&gateway, 1);
    session.set_marks(" 17.5 ");

    let record = session.save(&gateway, "ms-lee").unwrap();

    assert_eq!(record.marks_awarded, Some(17.5));
    assert_eq!(record.feedback, None);
    assert_eq!(record.annotated_pdf_url, None);
    assert!(gateway.fetched_urls.borrow().is_empty());
    assert_eq!(gateway.uploads.get(), 0);
}

#[test]
fn invalid_marks_stop_the_save_before_anything_happens() {
    let gateway = MemoryGateway::with_submission(1);
    let mut session = open_session(&gateway, 1);
    drag(&mut session, &[(100.0, 100.0), (200.0, 200.0)]);
    session.set_marks("ten");

    let error = session.save(&gateway, "ms-lee").unwrap_err();

    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert!(gateway.fetched_urls.borrow().is_empty());
    assert_eq!(session.strokes().len(), 1);
    assert_eq!(gateway.stored_record().status, ReviewStatus::Submitted);
}

#[test]
fn failed_saves_keep_the_work_for_a_retry() {
    let gateway = MemoryGateway::with_submission(1);
    let mut session = open_session(&gateway, 1);
    drag(&mut session, &[(100.0, 100.0), (200.0, 200.0), (300.0, 100.0)]);
    session.set_marks("8");

    for failing_step in [&gateway.fail_fetch, &gateway.fail_upload, &gateway.fail_update] {
        failing_step.set(true);
        let error = session.save(&gateway, "ms-lee").unwrap_err();
        failing_step.set(false);

        assert!(error.is_transient(), "{}", error);
        assert_eq!(session.strokes().len(), 1);
        assert_eq!(session.marks(), "8");
        assert_eq!(session.record().status, ReviewStatus::Submitted);
        assert_eq!(gateway.stored_record().status, ReviewStatus::Submitted);
    }

    let record = session.save(&gateway, "ms-lee").unwrap();
    assert_eq!(record.marks_awarded, Some(8.0));
    assert!(record.annotated_pdf_url.is_some());
    assert!(session.strokes().is_empty());
}

#[test]
fn later_reviews_draw_onto_the_annotated_document() {
    let gateway = MemoryGateway::with_submission(1);
    let mut session = open_session(&gateway, 1);
    drag(&mut session, &[(100.0, 100.0), (200.0, 200.0)]);
    let first_url = session
        .save(&gateway, "ms-lee")
        .unwrap()
        .annotated_pdf_url
        .clone()
        .unwrap();

    // A new session on the saved record, as when the reviewer comes back later
    let mut session = open_session(&gateway, 1);
    drag(&mut session, &[(300.0, 300.0), (400.0, 400.0)]);
    let second_url = session
        .save(&gateway, "mr-okafor")
        .unwrap()
        .annotated_pdf_url
        .clone()
        .unwrap();

    assert_ne!(first_url, second_url);
    assert_eq!(
        *gateway.fetched_urls.borrow(),
        vec![SUBMISSION_URL.to_string(), first_url]
    );
    assert_eq!(drawn_paths(&page_operations(&gateway.document(&second_url))[0]).len(), 2);
    assert_eq!(gateway.stored_record().reviewed_by.as_deref(), Some("mr-okafor"));
}

#[test]
fn ink_outside_the_document_leaves_the_annotated_document_alone() {
    let gateway = MemoryGateway::with_submission(1);
    let mut session = open_session(&gateway, 1);
    session.import_strokes(
        StrokeList::from_strokes(vec![Stroke {
            page: 4,
            points: vec![NormalizedPoint::new(0.1, 0.1), NormalizedPoint::new(0.2, 0.2)],
            color: Color::RED,
            width: 2.0,
        }])
        .unwrap(),
    );
    session.set_feedback("Only page 1 was submitted?");

    let record = session.save(&gateway, "ms-lee").unwrap();

    assert_eq!(record.annotated_pdf_url, None);
    assert_eq!(record.feedback.as_deref(), Some("Only page 1 was submitted?"));
    assert_eq!(gateway.uploads.get(), 0);
}

#[test]
fn each_page_keeps_its_own_ink_and_undo() {
    let gateway = MemoryGateway::with_submission(3);
    let mut session = open_session(&gateway, 3);
    drag(&mut session, &[(100.0, 100.0), (200.0, 200.0)]);
    session.go_to_page(3, &FakeViewer);
    drag(&mut session, &[(100.0, 100.0), (200.0, 200.0)]);
    drag(&mut session, &[(300.0, 300.0), (400.0, 400.0)]);

    session.undo();
    session.previous_page(&FakeViewer);
    session.previous_page(&FakeViewer);
    assert_eq!(session.clear_page(), 1);

    assert_eq!(session.strokes().pages(), vec![3]);
    let record = session.save(&gateway, "ms-lee").unwrap().clone();
    let pages = page_operations(&gateway.document(record.annotated_pdf_url.as_deref().unwrap()));
    let drawn: Vec<usize> = pages.iter().map(|operations| drawn_paths(operations).len()).collect();
    assert_eq!(drawn, vec![0, 0, 1]);
}

#[test]
fn a_lost_annotated_document_is_never_replaced_by_the_original() {
    let gateway = MemoryGateway::with_submission(1);
    let lost_url = "memory://uploads/7/graded-s-1.pdf";
    gateway.records.borrow_mut().get_mut("s-1").unwrap().annotated_pdf_url = Some(lost_url.to_string());
    let mut session = open_session(&gateway, 1);
    drag(&mut session, &[(100.0, 100.0), (200.0, 200.0)]);

    let error = session.save(&gateway, "ms-lee").unwrap_err();

    assert_eq!(error.kind, ErrorKind::Transport);
    assert_eq!(*gateway.fetched_urls.borrow(), vec![lost_url.to_string()]);
    assert_eq!(gateway.uploads.get(), 0);
    assert_eq!(session.strokes().len(), 1);
    assert_eq!(gateway.stored_record().status, ReviewStatus::Submitted);
}
