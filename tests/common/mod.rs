#![allow(dead_code)]

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, ObjectId, Stream,
};

/// Where the `MediaBox` of the fixture is declared.
#[derive(Debug, Clone, Copy)]
pub enum MediaBoxPlacement {
    OnEveryPage,
    OnThePageTree,
    Nowhere,
}

/// The drawing every fixture page starts with: a blue square.
pub fn original_operations() -> Vec<Operation> {
    vec![
        Operation::new(
            "rg",
            vec![Object::Integer(0), Object::Integer(0), Object::Integer(1)],
        ),
        Operation::new(
            "re",
            vec![
                Object::Integer(10),
                Object::Integer(10),
                Object::Integer(50),
                Object::Integer(50),
            ],
        ),
        Operation::new("f", vec![]),
    ]
}

/// Builds a PDF document with the given number of pages, each carrying the original drawing.
pub fn fixture_pdf(page_count: usize, media_box: [f32; 4], placement: MediaBoxPlacement) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let media_box: Vec<Object> = media_box.iter().map(|value| Object::Real(*value)).collect();

    let mut kids = Vec::new();
    for _ in 0..page_count {
        let content = Content {
            operations: original_operations(),
        };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let MediaBoxPlacement::OnEveryPage = placement {
            page.set("MediaBox", media_box.clone());
        }
        kids.push(Object::Reference(document.add_object(page)));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
    };
    if let MediaBoxPlacement::OnThePageTree = placement {
        pages.set("MediaBox", media_box);
    }
    document.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut pdf_bytes = Vec::new();
    document.save_to(&mut pdf_bytes).unwrap();
    pdf_bytes
}

pub fn letter_pdf(page_count: usize) -> Vec<u8> {
    fixture_pdf(page_count, [0.0, 0.0, 612.0, 792.0], MediaBoxPlacement::OnEveryPage)
}

/// The decoded content of every page of a document, in page order.
pub fn page_operations(pdf_bytes: &[u8]) -> Vec<Vec<Operation>> {
    let document = Document::load_mem(pdf_bytes).unwrap();
    document
        .get_pages()
        .values()
        .map(|page_id| page_content(&document, *page_id))
        .collect()
}

fn page_content(document: &Document, page_id: ObjectId) -> Vec<Operation> {
    let content = document.get_page_content(page_id).unwrap();
    Content::decode(&content).unwrap().operations
}

/// The operator names of a list of operations.
pub fn operators(operations: &[Operation]) -> Vec<&str> {
    operations
        .iter()
        .map(|operation| operation.operator.as_str())
        .collect()
}

/// The paths drawn with `m` and `l`, each as a list of points in document units.
pub fn drawn_paths(operations: &[Operation]) -> Vec<Vec<[f32; 2]>> {
    let mut paths: Vec<Vec<[f32; 2]>> = Vec::new();
    for operation in operations {
        let point = || {
            [
                operation.operands[0].as_float().unwrap(),
                operation.operands[1].as_float().unwrap(),
            ]
        };
        match operation.operator.as_str() {
            "m" => paths.push(vec![point()]),
            "l" => paths.last_mut().unwrap().push(point()),
            _ => {}
        }
    }
    paths
}
