use accord::matching::{match_json, match_request, MatchingContext};
use accord::matchingrules::{Category, MatchingRule, MatchingRuleCategory};
use accord::model::HttpRequest;
use accord::MismatchKind;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

fn order_list(count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| {
                json!({
                    "id": i,
                    "reference": format!("ORD-{i:06}"),
                    "status": "open",
                    "lines": [{"sku": "A-1", "quantity": 2}, {"sku": "B-7", "quantity": 1}]
                })
            })
            .collect(),
    )
}

fn order_rules() -> MatchingRuleCategory {
    let mut rules = MatchingRuleCategory::new(Category::Body);
    for (path, rule) in [
        ("$", MatchingRule::MinType(1)),
        ("$[*].id", MatchingRule::Integer),
        ("$[*].reference", MatchingRule::Regex(r"ORD-\d{6}".to_string())),
        ("$[*].lines", MatchingRule::MinType(1)),
        ("$[*].lines[*].quantity", MatchingRule::Integer),
    ] {
        rules.add_rule(path, rule).unwrap();
    }
    rules
}

fn bench_json_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_matching");
    let expected = order_list(1);
    let rules = order_rules();
    let empty = MatchingRuleCategory::new(Category::Body);

    for count in [1, 10, 100, 1000].iter() {
        let actual = order_list(*count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("equality", count), count, |b, _| {
            let ctx = MatchingContext::new(&empty, MismatchKind::Body);
            b.iter(|| match_json(black_box(&actual), black_box(&actual), &ctx))
        });

        group.bench_with_input(BenchmarkId::new("rules", count), count, |b, _| {
            let ctx = MatchingContext::new(&rules, MismatchKind::Body);
            b.iter(|| match_json(black_box(&expected), black_box(&actual), &ctx))
        });
    }

    group.finish();
}

fn bench_request_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_matching");

    let expected = HttpRequest::new("POST", "/orders")
        .with_query("dry_run", "false")
        .with_header("Content-Type", "application/json")
        .with_json_body(json!({"sku": "A-1", "quantity": 2}))
        .with_rule(Category::Body, "$.quantity", MatchingRule::Integer)
        .unwrap()
        .with_rule(Category::Header, "Authorization", MatchingRule::Regex("Bearer .+".into()))
        .unwrap();
    let matching = HttpRequest::new("POST", "/orders")
        .with_query("dry_run", "false")
        .with_header("Content-Type", "application/json; charset=utf-8")
        .with_header("Authorization", "Bearer abc")
        .with_json_body(json!({"sku": "A-1", "quantity": 5}));
    let mismatching = HttpRequest::new("POST", "/orders")
        .with_header("Content-Type", "application/json")
        .with_json_body(json!({"sku": "Z-9", "quantity": "five", "note": "x"}));

    group.bench_function("match", |b| {
        b.iter(|| match_request(black_box(&expected), black_box(&matching)))
    });
    group.bench_function("mismatch", |b| {
        b.iter(|| match_request(black_box(&expected), black_box(&mismatching)))
    });

    group.finish();
}

criterion_group!(benches, bench_json_matching, bench_request_matching);
criterion_main!(benches);
