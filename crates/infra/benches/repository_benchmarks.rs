use std::borrow::Cow;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio::runtime::{Builder, Runtime};

use warden_core::{Entity, ListQuery, Pagination, Repository};
use warden_infra::InMemoryRepository;

#[derive(Debug, Clone)]
struct Row {
    id: u64,
    email: String,
    group: String,
}

impl Entity for Row {
    type Id = u64;
    const RESOURCE: &'static str = "row";

    fn id(&self) -> &u64 {
        &self.id
    }

    fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "group" => Some(Cow::Borrowed(&self.group)),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.clone())]
    }
}

fn row(id: u64) -> Row {
    Row {
        id,
        email: format!("user{id}@example.com"),
        group: format!("g{}", id % 10),
    }
}

fn runtime() -> Runtime {
    Builder::new_current_thread().enable_all().build().unwrap()
}

fn seeded(rt: &Runtime, size: u64) -> InMemoryRepository<Row> {
    let repo = InMemoryRepository::new();
    rt.block_on(async {
        for id in 0..size {
            repo.create(row(id)).await.unwrap();
        }
    });
    repo
}

/// `create` checks every existing unique key, so cost grows with table size.
fn bench_create_with_unique_check(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("repository_create");

    for size in [100u64, 1_000, 10_000] {
        let repo = seeded(&rt, size);
        let mut next = size;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                next += 1;
                rt.block_on(repo.create(black_box(row(next)))).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_filtered_list(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("repository_list");

    for size in [100u64, 1_000, 10_000] {
        let repo = seeded(&rt, size);
        let query = ListQuery::new()
            .filter("group", "g3")
            .paginate(Pagination::new(Some(50), Some(0)));
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| rt.block_on(repo.list(black_box(&query))).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create_with_unique_check, bench_filtered_list);
criterion_main!(benches);
