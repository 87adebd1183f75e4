use std::hint::black_box;

use content_extensions::{compile_rule_list, match_url, Action, CompilerConfig, InMemoryClient, Rule, Trigger};
use criterion::{criterion_group, criterion_main, Criterion};

fn sample_rules(n: usize) -> Vec<Rule> {
    (0..n)
        .map(|i| {
            Rule::new(
                Trigger::new(format!("^https?://ad{i}\\.example\\.com/[a-z]+")),
                Action::BlockLoad,
            )
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let small = sample_rules(50);
    c.bench_function("compile_50_rules", |b| {
        b.iter(|| {
            let mut client = InMemoryClient::default();
            compile_rule_list(black_box(&small), &mut client, &CompilerConfig::default()).unwrap();
            client
        })
    });

    let large = sample_rules(2000);
    c.bench_function("compile_2000_rules", |b| {
        b.iter(|| {
            let mut client = InMemoryClient::default();
            compile_rule_list(black_box(&large), &mut client, &CompilerConfig::default()).unwrap();
            client
        })
    });

    {
        let mut client = InMemoryClient::default();
        compile_rule_list(&large, &mut client, &CompilerConfig::default()).unwrap();
        c.bench_function("match_against_2000_rules", |b| {
            b.iter(|| {
                match_url(
                    black_box(&client.bytecode),
                    black_box(&client.actions),
                    black_box(b"https://ad1337.example.com/banner".as_slice()),
                    0,
                )
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
