//! Planning-pipeline benchmarks: parse -> decompose -> logical plan ->
//! physical plan, scaling with the number of independent stars in the
//! query (spec.md §2 "Data flow").

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fedqp::catalog::{Catalog, DataSource, DataSourceKind, Federation, Molecule, Predicate, RangeRef};
use fedqp::{decomposer, logical_plan, physical_plan, sparql_parser};
use std::collections::{HashMap, HashSet};

fn single_endpoint_catalog() -> Catalog {
    let mut sources = HashMap::new();
    sources.insert(
        "E".to_string(),
        DataSource {
            id: "E".into(),
            url: "http://example.org/sparql".into(),
            kind: DataSourceKind::SparqlEndpoint,
            params: HashMap::new(),
            mapping_ids: vec![],
            typing_predicate: None,
            labeling_property: None,
        },
    );

    let mut predicates = HashMap::new();
    predicates.insert(
        "http://example.org/p".to_string(),
        Predicate {
            pred_id: "http://example.org/p".into(),
            label: "p".into(),
            cardinality: 1_000,
            ranges: HashSet::from([RangeRef::Datatype(
                "http://www.w3.org/2001/XMLSchema#string".into(),
            )]),
        },
    );

    let mut predicate_sources = HashMap::new();
    predicate_sources.insert(
        "E".to_string(),
        HashSet::from(["http://example.org/p".to_string()]),
    );

    let molecule = Molecule {
        mt_id: "http://example.org/C".into(),
        label: "C".into(),
        cardinality: 1_000,
        subclass_of: vec![],
        predicates,
        datasources: HashSet::from(["E".to_string()]),
        predicate_sources,
        predicate_rml_sources: HashMap::new(),
        instance_prefixes: vec![],
        mapping_ids: HashMap::new(),
    };

    Catalog::build(Federation {
        fed_id: "bench".into(),
        name: "bench".into(),
        desc: String::new(),
        sources,
        rdfmts: vec![molecule],
        mappings: fedqp::mapping::MappingArena::new(),
    })
    .expect("benchmark catalog builds")
}

/// A query with `n` independent stars, each joined to the next through a
/// shared object variable — the shape a bushy join tree has to fold.
fn query_with_stars(n: u32) -> String {
    let mut patterns = Vec::new();
    for i in 0..n {
        patterns.push(format!(
            "?s{i} a <http://example.org/C> ; <http://example.org/p> ?o{i} .",
        ));
        if i > 0 {
            patterns.push(format!("FILTER(?o{i} != ?o{prev})", prev = i - 1));
        }
    }
    format!("SELECT * WHERE {{ {} }}", patterns.join(" "))
}

fn bench_decompose(c: &mut Criterion) {
    let catalog = single_endpoint_catalog();

    let mut group = c.benchmark_group("decompose");
    for size in [1u32, 10, 50] {
        let query = query_with_stars(size);
        let algebra = sparql_parser::parse_query(&query).expect("parses");

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| decomposer::decompose(&algebra, &catalog).expect("decomposes"));
        });
    }
    group.finish();
}

fn bench_full_planning_pipeline(c: &mut Criterion) {
    let catalog = single_endpoint_catalog();

    let mut group = c.benchmark_group("plan_pipeline");
    for size in [1u32, 10, 50] {
        let query = query_with_stars(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let algebra = sparql_parser::parse_query(&query).expect("parses");
                let decomposed = decomposer::decompose(&algebra, &catalog).expect("decomposes");
                let logical = logical_plan::build(&decomposed, &catalog);
                physical_plan::build_join_tree(&logical, &catalog, 10_000)
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_decompose, bench_full_planning_pipeline
}
criterion_main!(benches);
