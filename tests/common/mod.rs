//! Shared helpers for integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_finder::sources::{MockSource, SourceRegistry};
use pdf_finder::{Candidate, SearchOrchestrator};
use std::sync::Arc;

/// Build a PDF with `pages` pages, each showing `line` once
pub fn build_pdf(pages: usize, line: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 8.into()]),
                Operation::new("Td", vec![20.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// A three-page document with well over 1000 characters of text
pub fn text_heavy_pdf() -> Vec<u8> {
    let line = "The quick brown fox jumps over the lazy dog. ".repeat(10);
    build_pdf(3, &line)
}

/// Orchestrator over a single mock catalog returning `candidates`
pub fn orchestrator_with(candidates: Vec<Candidate>) -> (SearchOrchestrator, Arc<MockSource>) {
    let source = Arc::new(MockSource::new("mock", "Mock").with_candidates(candidates));
    let mut registry = SourceRegistry::new();
    registry.register(source.clone());
    (SearchOrchestrator::new(registry), source)
}
