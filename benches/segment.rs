//! Segmentation and full extraction of a large synthetic solicitation.

#![allow(missing_docs)]

use std::fmt::Write;

use criterion::{criterion_group, criterion_main, Criterion};
use shall::{
    extraction::{PageBoundaries, Segmenter},
    Config, DocumentId, PatternCatalog, Pipeline,
};

/// Generates a solicitation with numbered sections, lists and page breaks.
fn solicitation(sections: usize) -> String {
    let mut text = String::new();
    for section in 1..=sections {
        writeln!(text, "SECTION C.{section} - TECHNICAL REQUIREMENTS").unwrap();
        writeln!(text).unwrap();
        writeln!(
            text,
            "The contractor shall maintain 99.9% availability for system {section}. \
             All data shall be encrypted at rest. See Section L.{section} for details."
        )
        .unwrap();
        writeln!(text).unwrap();
        writeln!(text, "(a) The contractor shall deliver a monthly report.").unwrap();
        writeln!(text, "(b) Key personnel must hold a SECRET clearance.").unwrap();
        writeln!(text).unwrap();
        if section % 3 == 0 {
            text.push('\u{c}');
        }
    }
    text
}

fn segment(c: &mut Criterion) {
    let config = Config::default();
    let document = DocumentId::new("bench-rfp".to_string()).unwrap();
    let text = solicitation(200);

    let segmenter = Segmenter::from_config(&config);
    c.bench_function("segment 200 sections", |b| {
        b.iter(|| {
            segmenter
                .segment(&document, &text, &PageBoundaries::detect())
                .unwrap()
        });
    });

    let mut config = config;
    config.embedding = shall::domain::EmbeddingConfig::None;
    let pipeline = Pipeline::new(&config, PatternCatalog::builtin().unwrap());
    c.bench_function("extract 200 sections", |b| {
        b.iter(|| {
            pipeline
                .process(&document, &text, &PageBoundaries::detect())
                .unwrap()
        });
    });
}

criterion_group!(benches, segment);
criterion_main!(benches);
