use criterion::{Criterion, black_box, criterion_group, criterion_main};
use weft_signals::ObservableList;

fn benchmark_splice(c: &mut Criterion) {
    c.bench_function("splice front 1000", |b| {
        b.iter(|| {
            let list = ObservableList::new(Vec::new());
            for i in 0..1000 {
                let _ = list.splice(0, 0, [black_box(i)]);
            }
            weft_scheduler::tick();
        })
    });
}

fn benchmark_filter(c: &mut Criterion) {
    c.bench_function("filter follow 1000 pushes", |b| {
        b.iter(|| {
            let list = ObservableList::new(Vec::new());
            let evens = list.filter(|x: &i32, _| x % 2 == 0, &[]);
            for i in 0..1000 {
                let _ = list.push(i);
            }
            weft_scheduler::tick();
            black_box(evens.len());
        })
    });
}

criterion_group!(benches, benchmark_splice, benchmark_filter);
criterion_main!(benches);
