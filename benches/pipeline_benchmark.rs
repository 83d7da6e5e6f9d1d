//! Criterion benchmarks for the classification pipeline
//!
//! These benchmarks measure:
//! - Text normalization
//! - TF-IDF fit and transform
//! - Logistic regression training and prediction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spam_detector::ml::{LogisticRegression, TfidfVectorizer};
use spam_detector::nlp::TextNormalizer;

const SAMPLES: [(&str, u8); 8] = [
    ("WINNER!! You have won a $1000 prize! Call 123-456-7890 now!", 1),
    ("FREE entry to win! Text WIN to 12345. Visit http://example.com", 1),
    ("URGENT: Your account will be closed! Click here: www.phishing.com", 1),
    ("Get 50% OFF on all products! Limited time offer! Call 999-888-7777", 1),
    ("Hey, are we still meeting for lunch tomorrow at 2pm?", 0),
    ("Thanks for the meeting. I'll send the report by Friday.", 0),
    ("Can you pick up some milk on the way home?", 0),
    ("Running late, please start the meeting without me", 0),
];

/// Alphabetic tag for `n` ("qa", "qb", ...); digits would be stripped
fn tag(mut n: usize) -> String {
    let mut out = String::from("q");
    loop {
        out.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
        if n == 0 {
            return out;
        }
    }
}

/// Repeat the samples with a distinct tag so the vocabulary grows
fn corpus(size: usize) -> (Vec<String>, Vec<u8>) {
    (0..size)
        .map(|i| {
            let (text, label) = SAMPLES[i % SAMPLES.len()];
            (format!("{} {}", text, tag(i % 500)), label)
        })
        .unzip()
}

/// Benchmark text normalization
fn bench_normalize(c: &mut Criterion) {
    let normalizer = TextNormalizer::english().unwrap();

    c.bench_function("normalize_message", |b| {
        b.iter(|| normalizer.normalize(black_box(SAMPLES[0].0)));
    });
}

/// Benchmark vectorizer fit and transform
fn bench_vectorizer(c: &mut Criterion) {
    let normalizer = TextNormalizer::english().unwrap();
    let mut group = c.benchmark_group("tfidf");

    for size in [100, 1000] {
        let (texts, _) = corpus(size);
        let cleaned: Vec<String> = texts.iter().map(|t| normalizer.normalize(t)).collect();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("fit", size), &cleaned, |b, cleaned| {
            b.iter(|| TfidfVectorizer::new(3000).fit(black_box(cleaned)).unwrap());
        });

        let state = TfidfVectorizer::new(3000).fit(&cleaned).unwrap();
        group.bench_with_input(
            BenchmarkId::new("transform_batch", size),
            &cleaned,
            |b, cleaned| {
                b.iter(|| state.transform_batch(black_box(cleaned)));
            },
        );
    }

    group.finish();
}

/// Benchmark classifier training and prediction
fn bench_classifier(c: &mut Criterion) {
    let normalizer = TextNormalizer::english().unwrap();
    let (texts, labels) = corpus(1000);
    let cleaned: Vec<String> = texts.iter().map(|t| normalizer.normalize(t)).collect();
    let state = TfidfVectorizer::new(3000).fit(&cleaned).unwrap();
    let x = state.transform_batch(&cleaned);

    let mut group = c.benchmark_group("logistic_regression");
    group.sample_size(10);
    group.bench_function("train_1000", |b| {
        b.iter(|| LogisticRegression::default().train(black_box(&x), &labels).unwrap());
    });

    let model = LogisticRegression::default().train(&x, &labels).unwrap();
    group.bench_function("predict", |b| {
        b.iter(|| model.predict(black_box(&x[0])).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_vectorizer, bench_classifier);
criterion_main!(benches);
