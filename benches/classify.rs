//! Rule-based classification throughput over a mixed batch of sentences.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, Criterion};
use shall::{extraction::RuleClassifier, PatternCatalog};

const SENTENCES: &[&str] = &[
    "The contractor shall maintain 99.9% uptime for production systems.",
    "All data shall be encrypted at rest in accordance with FIPS 140-2.",
    "The contractor shall deliver a monthly status report within five days.",
    "Offerors must hold an active facility clearance at the SECRET level.",
    "Key personnel shall have at least ten years of relevant experience.",
    "The government will provide office space for up to four contractor staff.",
    "Proposals are due no later than 2:00 PM Eastern on the closing date.",
    "The system shall respond to 95% of queries in under two seconds.",
];

fn classify(c: &mut Criterion) {
    let catalog = PatternCatalog::builtin().unwrap();
    let classifier = RuleClassifier::new(catalog);

    c.bench_function("classify sentences", |b| {
        b.iter(|| {
            for sentence in SENTENCES {
                std::hint::black_box(classifier.classify(sentence));
            }
        });
    });

    c.bench_function("classify in section", |b| {
        b.iter(|| {
            for sentence in SENTENCES {
                std::hint::black_box(
                    classifier.classify_in_section(sentence, Some("SECURITY REQUIREMENTS")),
                );
            }
        });
    });
}

criterion_group!(benches, classify);
criterion_main!(benches);
