//! 资格评估性能基准测试
//!
//! 测试覆盖：
//! - 生效窗口解析与判断
//! - 频率 / 周期策略评估
//! - 不同属性数量下的过滤匹配

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use offer_engine::policy::evaluate;
use offer_engine::trigger::is_triggered;
use offer_engine::{FilterAttributes, FrequencyOrPeriod, PlayerCounters, TemplateFilters, Trigger};
use serde_json::{Map, Value, json};
use std::hint::black_box;

const NOW: i64 = 1_700_000_000;

fn bench_trigger(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger");

    let window = json!({"from": NOW - 3_600, "to": NOW + 3_600});
    group.bench_function("parse_window", |b| {
        b.iter(|| Trigger::from_json(black_box(&window)))
    });

    let trigger = Trigger::from_json(&window).unwrap();
    group.bench_function("is_triggered", |b| {
        b.iter(|| is_triggered(black_box(&trigger), black_box(NOW)))
    });

    group.finish();
}

fn bench_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy");

    let cases = [
        (
            "unbounded",
            FrequencyOrPeriod::default(),
            FrequencyOrPeriod::default(),
        ),
        (
            "max_only",
            FrequencyOrPeriod::new("", 10),
            FrequencyOrPeriod::new("", 3),
        ),
        (
            "cooldowns",
            FrequencyOrPeriod::new("30m", 10),
            FrequencyOrPeriod::new("24h", 3),
        ),
        (
            "compound_duration",
            FrequencyOrPeriod::new("1h30m15s", 0),
            FrequencyOrPeriod::new("168h", 0),
        ),
    ];

    let counters = PlayerCounters {
        view_counter: 2,
        view_timestamp: NOW - 7_200,
        claim_counter: 1,
        claim_timestamp: NOW - 90_000,
    };

    for (name, frequency, period) in &cases {
        group.bench_with_input(BenchmarkId::new("evaluate", name), name, |b, _| {
            b.iter(|| evaluate(black_box(frequency), black_box(period), &counters, NOW))
        });
    }

    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");

    for size in [1usize, 4, 16] {
        let declared: Map<String, Value> = (0..size)
            .map(|i| (format!("attr_{}", i), json!({"eq": format!("value_{}", i)})))
            .collect();
        let filters = TemplateFilters::from_json(&Value::Object(declared)).unwrap();
        let attrs: FilterAttributes = (0..size)
            .map(|i| (format!("attr_{}", i), format!("value_{}", i)))
            .collect();

        group.bench_with_input(BenchmarkId::new("matches", size), &size, |b, _| {
            b.iter(|| filters.matches(black_box(&attrs), false))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_trigger, bench_policy, bench_filters);
criterion_main!(benches);
