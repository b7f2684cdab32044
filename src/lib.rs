//! Gradeink lets a reviewer draw freehand ink on top of a submitted PDF document, and burns
//! that ink into the document as vector strokes when the review is saved, together with the
//! marks and the feedback of the review.
//!
//! The ink is recorded in normalized page coordinates, so it is independent of how large the
//! page was displayed while drawing. The `GradingSession` struct ties everything together:
//! it records the strokes, keeps the overlay painted and runs the save pipeline through a
//! `PersistenceGateway`.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

/// The colors of the ink, parsed from and serialized to hex strings.
pub mod color;

/// The module where the ink is burned into the PDF document.
///
/// # Introduction
///
/// The entry point of this module is the `compose` function, which takes the bytes of a PDF
/// document and the strokes to draw, and returns the bytes of the new document. The strokes of
/// each page are appended to its content streams as stroked paths, while the original content
/// of the page is wrapped into its own graphics state block so that it can't alter the ink.
///
/// Strokes which can't be drawn, such as the ones pointing to a page the document doesn't
/// have, are skipped rather than failing the whole composition. The `compose_with_report`
/// variant tells which ones were skipped and why.
pub mod compositor;

/// The settings of the command line tool.
pub mod configuration;

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// Every error carries an `ErrorKind`, which is what callers look at in order to decide how to
/// react, for example whether a failed save can simply be retried, together with a readable
/// context and the message of the error which caused it, if any.
pub mod error;

/// The boundary between the grading session and the outside world: fetching and uploading
/// documents, and keeping the grading records. `LocalGateway` keeps everything on disk.
pub mod gateway;

/// Conversions between the pixel space of the screen, the normalized space the strokes are
/// recorded in, and the coordinate space of the PDF page.
pub mod geometry;

/// The transparent surface painted on top of the rendered page.
pub mod overlay;

/// The grading record of a submission and the update persisted when a review is saved.
pub mod record;

/// Turns the pointer events of a drag into strokes.
pub mod recorder;

/// The module where the `GradingSession` is presented.
///
/// A session owns the strokes drawn during the review of one submission, the state of the
/// form with the marks and the feedback, and the page being shown. Its `save` method runs the
/// whole pipeline: fetching the latest version of the document, burning the ink into it,
/// uploading the result and updating the grading record.
pub mod session;

/// The strokes of a review, kept in drawing order, which is also the order they are undone in.
pub mod stroke;
