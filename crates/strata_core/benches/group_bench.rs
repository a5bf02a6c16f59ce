//! Group maintenance benchmarks
//!
//! Creates entities with a random subset of five components while four
//! groups are watching, then measures component churn on a populated context.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use strata_core::{Component, Context, Entity, Group, Matcher};

#[derive(Debug)]
struct Flag;
#[derive(Debug)]
struct Name(&'static str);
#[derive(Debug)]
struct Age(u32);
#[derive(Debug)]
struct Resources(u32);
#[derive(Debug)]
struct Position(i32, i32);

impl Component for Flag {}
impl Component for Name {}
impl Component for Age {}
impl Component for Resources {}
impl Component for Position {}

struct XorShift(u64);

impl XorShift {
    fn coin(&mut self) -> bool {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 & 1 == 1
    }
}

fn four_groups(context: &Context) -> [Group; 4] {
    [
        context.entity_group(Matcher::all([Name::id(), Age::id()])),
        context.entity_group(Matcher::all([Name::id(), Age::id(), Position::id()])),
        context.entity_group(Age::matcher()),
        context.entity_group(Matcher::any([Position::id(), Flag::id()])),
    ]
}

fn add_random_components(entity: &Entity, rng: &mut XorShift) {
    if rng.coin() {
        entity.set(Flag);
    }
    if rng.coin() {
        entity.set(Name("Max"));
    }
    if rng.coin() {
        entity.set(Age(33));
    }
    if rng.coin() {
        entity.set(Resources(3451));
    }
    if rng.coin() {
        entity.set(Position(13, 15));
    }
}

fn populated(count: usize) -> (Context, [Group; 4]) {
    let context = Context::new();
    let groups = four_groups(&context);
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    for _ in 0..count {
        add_random_components(&context.create_entity(), &mut rng);
    }
    (context, groups)
}

fn bench_create_with_random_components(c: &mut Criterion) {
    c.bench_function("create_1000_random_components", |b| {
        b.iter_batched(
            || {
                let context = Context::new();
                let groups = four_groups(&context);
                (context, groups)
            },
            |(context, groups)| {
                let mut rng = XorShift(0x2545_f491_4f6c_dd1d);
                for _ in 0..1_000 {
                    add_random_components(&context.create_entity(), &mut rng);
                }
                black_box(groups.iter().map(Group::len).sum::<usize>())
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_component_churn(c: &mut Criterion) {
    let (context, groups) = populated(1_000);
    let entities = context.entities();

    c.bench_function("toggle_age_on_1000", |b| {
        b.iter(|| {
            for entity in &entities {
                if entity.remove::<Age>().is_none() {
                    entity.set(Age(1));
                }
            }
            black_box(groups[2].len())
        })
    });
}

fn bench_sorted_entities(c: &mut Criterion) {
    let (_context, groups) = populated(1_000);

    c.bench_function("sorted_entities_cached", |b| {
        b.iter(|| black_box(groups[3].sorted_entities().len()))
    });
}

fn bench_read_components(c: &mut Criterion) {
    let (_context, groups) = populated(1_000);
    let members = groups[1].sorted_entities();

    c.bench_function("read_components_of_full_members", |b| {
        b.iter(|| {
            let mut total = 0i64;
            for entity in &members {
                let (Some(name), Some(age), Some(position)) = (
                    entity.get::<Name>(),
                    entity.get::<Age>(),
                    entity.get::<Position>(),
                ) else {
                    continue;
                };
                total += name.0.len() as i64 + i64::from(age.0);
                total += i64::from(position.0 + position.1);
                if let Some(resources) = entity.get::<Resources>() {
                    total += i64::from(resources.0);
                }
            }
            black_box(total)
        })
    });
}

criterion_group!(
    benches,
    bench_create_with_random_components,
    bench_component_churn,
    bench_sorted_entities,
    bench_read_components
);
criterion_main!(benches);
