use lopdf::{
    content::{Content, Operation},
    Dictionary, Document, Object, ObjectId, Stream,
};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    io::BufWriter,
    mem,
};

use crate::{
    error::{ContextError, ErrorKind},
    geometry::PageBox,
    stroke::Stroke,
};

/// How deep the `Parent` chain of a page is followed when looking for an inherited `MediaBox`.
const MAXIMUM_PAGE_TREE_DEPTH: usize = 64;

/// What happened to each of the strokes handed to the compositor. The skipped strokes are
/// identified by their index in the input slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionReport {
    /// The number of strokes burned into the document.
    pub strokes_drawn: usize,
    /// Strokes pointing to a page the document doesn't have.
    pub skipped_out_of_range: Vec<usize>,
    /// Strokes with non-finite coordinates or width, or points outside of the page.
    pub skipped_invalid: Vec<usize>,
    /// Strokes with a single point, which have no segment to draw.
    pub skipped_too_short: Vec<usize>,
}

/// Burns the strokes into the given PDF document and returns the bytes of the new document.
///
/// The source is returned untouched when there is nothing to draw.
pub fn compose(source_pdf_bytes: &[u8], strokes: &[Stroke]) -> Result<Vec<u8>, ContextError> {
    compose_with_report(source_pdf_bytes, strokes).map(|(pdf_bytes, _)| pdf_bytes)
}

/// Like `compose`, but also reports which strokes were drawn and which were skipped.
pub fn compose_with_report(
    source_pdf_bytes: &[u8],
    strokes: &[Stroke],
) -> Result<(Vec<u8>, CompositionReport), ContextError> {
    let mut report = CompositionReport::default();
    if strokes.is_empty() {
        return Ok((source_pdf_bytes.to_vec(), report));
    }

    let mut document = Document::load_mem(source_pdf_bytes).map_err(|error| {
        ContextError::with_error(
            ErrorKind::DocumentParse,
            "Unable to parse the source PDF document",
            &error,
        )
    })?;
    // The pages are numbered from 1, exactly like the pages of the strokes
    let pages = document.get_pages();
    log::debug!(
        "Composing {} strokes onto a document of {} pages",
        strokes.len(),
        pages.len()
    );

    // Collect the strokes of each page into its own ink layer, keeping the drawing order
    let mut ink_layers = BTreeMap::<u32, InkLayer>::new();
    for (index, stroke) in strokes.iter().enumerate() {
        let Some(page_id) = pages.get(&stroke.page) else {
            log::warn!(
                "Skipping stroke {} on page {}, the document only has {} pages",
                index,
                stroke.page,
                pages.len()
            );
            report.skipped_out_of_range.push(index);
            continue;
        };
        if !stroke.is_drawable() {
            log::debug!("Skipping stroke {} on page {}, it has no segment", index, stroke.page);
            report.skipped_too_short.push(index);
            continue;
        }
        if let Err(error) = stroke.validate() {
            log::warn!("Skipping stroke {}: {}", index, error);
            report.skipped_invalid.push(index);
            continue;
        }

        let ink_layer = match ink_layers.entry(stroke.page) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let page_box = page_box(&document, *page_id)?;
                entry.insert(InkLayer::new(*page_id, page_box))
            }
        };
        ink_layer.add_stroke(stroke);
        report.strokes_drawn += 1;
    }

    if ink_layers.is_empty() {
        log::info!("None of the {} strokes could be drawn, keeping the source document", strokes.len());
        return Ok((source_pdf_bytes.to_vec(), report));
    }

    for (page_number, ink_layer) in ink_layers {
        log::debug!(
            "Burning {} operations into page {}",
            ink_layer.operations.len(),
            page_number
        );
        ink_layer.burn_into(&mut document)?;
    }

    let pdf_bytes = save_to_bytes(&mut document)?;
    Ok((pdf_bytes, report))
}

/// The ink drawn on one page, as content stream operations in the coordinate space of the page.
#[derive(Debug, Clone)]
struct InkLayer {
    /// The page the ink belongs to.
    page_id: ObjectId,
    /// The visible box of the page, which the normalized points are mapped onto.
    page_box: PageBox,
    /// Stream operations of the ink, one isolated graphics state block per stroke.
    operations: Vec<Operation>,
}

impl InkLayer {
    fn new(page_id: ObjectId, page_box: PageBox) -> Self {
        InkLayer {
            page_id,
            page_box,
            operations: Vec::new(),
        }
    }

    /// Appends the operations drawing the stroke as connected straight segments.
    fn add_stroke(&mut self, stroke: &Stroke) {
        let page_box = self.page_box;
        let mut mapped_points = stroke
            .points
            .iter()
            .map(|point| page_box.to_document(*point));
        let Some([start_x, start_y]) = mapped_points.next() else {
            return;
        };

        // In the PDF specification the q/Q operators enclose an isolated graphics state block
        self.operations.push(Operation::new("q", vec![]));
        // Set the stroking color, the line width and round caps and joins
        let [red, green, blue] = stroke.color.to_array();
        self.operations.push(Operation::new(
            "RG",
            vec![red, green, blue].into_iter().map(Object::Real).collect(),
        ));
        self.operations
            .push(Operation::new("w", vec![Object::Real(stroke.width)]));
        self.operations.push(Operation::new("J", vec![Object::Integer(1)]));
        self.operations.push(Operation::new("j", vec![Object::Integer(1)]));

        // Move to the first point, then extend the path through all the following ones
        self.operations.push(Operation::new(
            "m",
            vec![Object::Real(start_x), Object::Real(start_y)],
        ));
        for [x, y] in mapped_points {
            self.operations
                .push(Operation::new("l", vec![Object::Real(x), Object::Real(y)]));
        }

        // Stroke the path and restore the graphics state
        self.operations.push(Operation::new("S", vec![]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Appends the ink to the content of the page. The existing content gets wrapped into its
    /// own graphics state block first, so whatever state it leaves behind can't alter the ink.
    fn burn_into(self, document: &mut Document) -> Result<(), ContextError> {
        let page_id = self.page_id;
        let existing_contents = page_contents(document, page_id)?;

        let opening_stream = Stream::new(Dictionary::new(), b"q\n".to_vec()).with_compression(false);
        let opening_stream_id = document.add_object(opening_stream);
        let ink_stream: Stream = self.try_into()?;
        let ink_stream_id = document.add_object(ink_stream);

        let mut contents = Vec::with_capacity(existing_contents.len() + 2);
        contents.push(Object::Reference(opening_stream_id));
        contents.extend(existing_contents);
        contents.push(Object::Reference(ink_stream_id));

        let page_dictionary = document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|error| {
                ContextError::with_error(
                    ErrorKind::DocumentParse,
                    format!("Unable to access the page dictionary {:?}", page_id),
                    &error,
                )
            })?;
        page_dictionary.set("Contents", Object::Array(contents));

        Ok(())
    }
}

impl TryFrom<InkLayer> for Stream {
    type Error = ContextError;

    fn try_from(value: InkLayer) -> Result<Self, Self::Error> {
        // Restore the state saved by the opening stream before drawing the ink
        let mut operations = Vec::with_capacity(value.operations.len() + 1);
        operations.push(Operation::new("Q", vec![]));
        operations.extend(value.operations);

        let stream_content = Content { operations }.encode().map_err(|error| {
            ContextError::with_error(
                ErrorKind::Serialization,
                "Failed to encode the ink layer content",
                &error,
            )
        })?;

        // Page contents should not be compressed
        Ok(Stream::new(Dictionary::new(), stream_content).with_compression(false))
    }
}

/// Retrieves the content streams of a page as a list of references, whichever of the
/// forms allowed by the PDF specification the page uses.
fn page_contents(document: &Document, page_id: ObjectId) -> Result<Vec<Object>, ContextError> {
    let page_dictionary = document.get_dictionary(page_id).map_err(|error| {
        ContextError::with_error(
            ErrorKind::DocumentParse,
            format!("Unable to find the page dictionary {:?}", page_id),
            &error,
        )
    })?;

    match page_dictionary.get(b"Contents") {
        // A page without content is allowed, it is simply blank
        Err(_) => Ok(Vec::new()),
        Ok(Object::Array(contents)) => Ok(contents.clone()),
        Ok(Object::Reference(contents_id)) => match document.get_object(*contents_id) {
            // The reference may point to an array of streams rather than to a single stream
            Ok(Object::Array(contents)) => Ok(contents.clone()),
            Ok(_) => Ok(vec![Object::Reference(*contents_id)]),
            Err(error) => Err(ContextError::with_error(
                ErrorKind::DocumentParse,
                format!("Unable to resolve the contents of the page {:?}", page_id),
                &error,
            )),
        },
        Ok(_) => Err(ContextError::with_context(
            ErrorKind::DocumentParse,
            format!(
                "The contents of the page {:?} are neither a stream reference nor an array",
                page_id
            ),
        )),
    }
}

/// Finds the `MediaBox` of a page, following the page tree upwards when the page inherits it.
fn page_box(document: &Document, page_id: ObjectId) -> Result<PageBox, ContextError> {
    let mut node_id = Some(page_id);
    for _ in 0..MAXIMUM_PAGE_TREE_DEPTH {
        let Some(current_id) = node_id else {
            break;
        };
        let node = document.get_dictionary(current_id).map_err(|error| {
            ContextError::with_error(
                ErrorKind::DocumentParse,
                format!("Unable to read the page tree node {:?}", current_id),
                &error,
            )
        })?;

        if let Ok(media_box) = node.get(b"MediaBox") {
            return rectangle(document, media_box).map(PageBox::from_rectangle);
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    log::warn!(
        "The page {:?} declares no media box, assuming the US Letter size",
        page_id
    );
    Ok(PageBox::LETTER)
}

/// Reads a rectangle such as `[0 0 612 792]`, whose entries may be indirect objects.
fn rectangle(document: &Document, object: &Object) -> Result<[f32; 4], ContextError> {
    let invalid_rectangle = |error: &lopdf::Error| {
        ContextError::with_error(
            ErrorKind::DocumentParse,
            "Unable to read the page rectangle",
            error,
        )
    };

    let entries = resolve(document, object)?
        .as_array()
        .map_err(|error| invalid_rectangle(&error))?;
    let numbers = entries
        .iter()
        .map(|entry| resolve(document, entry)?.as_float().map_err(|error| invalid_rectangle(&error)))
        .collect::<Result<Vec<f32>, ContextError>>()?;

    match numbers[..] {
        [left, bottom, right, top] => Ok([left, bottom, right, top]),
        _ => Err(ContextError::with_context(
            ErrorKind::DocumentParse,
            format!("The page rectangle has {} entries instead of 4", numbers.len()),
        )),
    }
}

/// Follows an indirect reference to the object it points to.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, ContextError> {
    match object {
        Object::Reference(object_id) => document.get_object(*object_id).map_err(|error| {
            ContextError::with_error(
                ErrorKind::DocumentParse,
                format!("Unable to resolve the reference {:?}", object_id),
                &error,
            )
        }),
        _ => Ok(object),
    }
}

/// Save the document to bytes in order for it to be uploaded or written to a file.
fn save_to_bytes(document: &mut Document) -> Result<Vec<u8>, ContextError> {
    let mut pdf_document_bytes = Vec::new();
    let mut writer = BufWriter::new(&mut pdf_document_bytes);
    document.save_to(&mut writer).map_err(|error| {
        ContextError::with_error(
            ErrorKind::Serialization,
            "Error while saving the PDF document to bytes",
            &error,
        )
    })?;
    mem::drop(writer);

    Ok(pdf_document_bytes)
}
