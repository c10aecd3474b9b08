use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use dbtc_core::UserId;
use dbtc_game::{FlatRewards, JobGenerator, Profile};
use dbtc_infra::{Decision, InMemoryProfileStore, ProfileDispatcher, UserChanges};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn bench_job_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_generation");
    let generator = JobGenerator::default();
    let profile = Profile::new(UserId::new("bench"));

    for count in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut rng = StdRng::seed_from_u64(1);
            b.iter(|| black_box(generator.generate(&profile, count, Utc::now(), &mut rng).unwrap()));
        });
    }

    group.finish();
}

fn bench_optimistic_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimistic_commit");
    let rt = runtime();

    group.bench_function("credit_balance", |b| {
        let store = Arc::new(InMemoryProfileStore::new());
        let dispatcher = ProfileDispatcher::new(store);
        let user = UserId::new("bench");

        b.iter(|| {
            rt.block_on(dispatcher.mutate(&user, |mut snapshot| {
                snapshot.profile.credit(1);
                Ok(Decision::write(UserChanges::profile(snapshot.profile), ()))
            }))
            .unwrap()
        });
    });

    group.bench_function("accept_from_pool", |b| {
        let store = Arc::new(InMemoryProfileStore::new());
        let dispatcher = ProfileDispatcher::new(store);
        let generator = JobGenerator::default();
        let mut rng = StdRng::seed_from_u64(2);
        let user = UserId::new("bench");

        b.iter(|| {
            let pool = generator
                .generate(&Profile::new(user.clone()), 10, Utc::now(), &mut rng)
                .unwrap();
            rt.block_on(dispatcher.mutate(&user, move |mut snapshot| {
                snapshot.profile.active_job = None;
                snapshot.profile.assignment = None;
                let mut jobs = pool.clone();
                let accepted = snapshot.profile.accept_offer(&mut jobs, 3, &FlatRewards, Utc::now())?;
                Ok(Decision::write(
                    UserChanges::both(snapshot.profile, jobs),
                    accepted.reward.payout,
                ))
            }))
            .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_job_generation, bench_optimistic_commit);
criterion_main!(benches);
