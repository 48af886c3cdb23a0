use criterion::{black_box, criterion_group, criterion_main, Criterion};

use swar_core::model::QuestionKind;
use swar_core::similarity::similarity;
use swar_core::validation::validate;

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    let long_expected = "the little brown dog runs quickly across the big green park";
    let long_response = "the litle brown dog ran quickly across a big green park today";

    group.bench_function("word", |b| {
        b.iter(|| similarity(black_box("butterfly"), black_box("buterfly")))
    });

    group.bench_function("sentence", |b| {
        b.iter(|| similarity(black_box(long_expected), black_box(long_response)))
    });

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    group.bench_function("exact", |b| {
        b.iter(|| validate(black_box("cat"), black_box("cat"), QuestionKind::Word))
    });

    group.bench_function("sentence", |b| {
        b.iter(|| {
            validate(
                black_box("i see a big red dog"),
                black_box("I see a big red dog."),
                QuestionKind::Sentence,
            )
        })
    });

    group.bench_function("fuzzy_sentence", |b| {
        b.iter(|| {
            validate(
                black_box("the cat sat on a mat"),
                black_box("the cat sits on the mat"),
                QuestionKind::Sentence,
            )
        })
    });

    group.bench_function("numeric", |b| {
        b.iter(|| {
            validate(
                black_box("I think it is 7.4"),
                black_box("7.5"),
                QuestionKind::Calculation,
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_similarity, bench_validate);
criterion_main!(benches);
