use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use stagepipe::sample::{DEFAULT_LABEL_KEY, Metadata, Sample, SampleCollection};
use stagepipe::selection::{SelectionParams, select_with_rng};

fn synthetic_pool(classes: usize, per_class: usize) -> SampleCollection {
    let mut collection = SampleCollection::new();
    for class in 0..classes {
        for _ in 0..per_class {
            let mut metadata = Metadata::new();
            metadata.set(DEFAULT_LABEL_KEY, format!("class-{class:04}"));
            collection.push(Sample::new(metadata));
        }
    }
    collection
}

fn bench_select(c: &mut Criterion) {
    let pool = synthetic_pool(200, 50);
    let params = SelectionParams {
        max_classes: Some(100),
        min_instances: Some(20),
        fraction: 0.8,
        ..SelectionParams::default()
    };
    c.bench_function("select_200x50", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| select_with_rng(pool.clone(), &params, &mut rng));
    });
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
