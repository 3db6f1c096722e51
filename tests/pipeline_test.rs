//! End-to-end tests of the export pipeline against in-memory stores.
//!
//! - **Scenario** -- films, artists and credits produce the expected graph
//! - **Paging** -- page sizes, progress lines and empty tables
//! - **Full refresh** -- previous data is removed and reruns are idempotent
//! - **Failures** -- failed bulk calls are recorded and loading continues

mod common;

use cinegraph::models::{NodeLabel, PropertyValue, SqlValue};
use cinegraph::pipeline::{Pipeline, PipelineOptions};
use cinegraph::source::Table;
use cinegraph::stats::{Phase, RunReport};
use common::{artist, credit, film, text, MemoryGraph, MemorySource};

fn options(page_size: usize) -> PipelineOptions {
    PipelineOptions { page_size }
}

async fn run_with(
    source: MemorySource,
    graph: MemoryGraph,
    page_size: usize,
) -> (RunReport, MemorySource, MemoryGraph, Vec<String>) {
    let mut pipeline = Pipeline::with_output(source, graph, options(page_size), Vec::<u8>::new());
    let report = pipeline.run().await.unwrap();
    let (source, graph, out) = pipeline.into_parts();
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    (report, source, graph, lines)
}

fn scenario_source() -> MemorySource {
    MemorySource::new(
        vec![
            film("film1", "The Kid", Some(1921)),
            film("film2", "Metropolis", Some(1927)),
            film("film3", "Untitled", None),
        ],
        vec![
            artist("artist1", "Charles Chaplin", Some(1889)),
            artist("artist2", "Fritz Lang", None),
        ],
        vec![
            credit("artist1", "acted in", "film1"),
            credit("artist2", "directed", "film2"),
            credit("artist1", "unknown_role", "film3"),
        ],
    )
}

#[tokio::test]
async fn scenario_builds_expected_graph() {
    let (report, _, graph, lines) =
        run_with(scenario_source(), MemoryGraph::default(), 10_000).await;

    assert_eq!(graph.count(NodeLabel::Film), 3);
    assert_eq!(graph.count(NodeLabel::Artist), 2);
    assert_eq!(graph.rels.len(), 2);

    let acted = graph.rels_of("ACTED_IN");
    assert_eq!(acted.len(), 1);
    assert_eq!(acted[0].start, "artist1");
    assert_eq!(acted[0].end, "film1");

    let directed = graph.rels_of("DIRECTED");
    assert_eq!(directed.len(), 1);
    assert_eq!(directed[0].start, "artist2");
    assert_eq!(directed[0].end, "film2");

    assert!(!graph.rels.iter().any(|r| r.end == "film3"));

    let rels = report.phase(Phase::Relationships).unwrap();
    assert_eq!(rels.rows_read, 3);
    assert_eq!(rels.exported, 3);
    assert_eq!(rels.written, 2);
    assert_eq!(rels.dropped, 1);
    assert!(!report.has_failures());

    assert_eq!(
        lines,
        vec![
            "3/3 film records exported",
            "2/2 artist records exported",
            "3/3 relationships exported",
        ]
    );
}

#[tokio::test]
async fn node_keys_match_source_ids() {
    let (_, _, graph, _) = run_with(scenario_source(), MemoryGraph::default(), 2).await;

    assert_eq!(graph.keys(NodeLabel::Film), vec!["film1", "film2", "film3"]);
    assert_eq!(graph.keys(NodeLabel::Artist), vec!["artist1", "artist2"]);

    let (_, untitled) = graph
        .nodes
        .iter()
        .find(|(_, n)| n.key == "film3")
        .unwrap();
    assert!(!untitled.properties.iter().any(|(name, _)| *name == "startYear"));

    let (_, chaplin) = graph
        .nodes
        .iter()
        .find(|(_, n)| n.key == "artist1")
        .unwrap();
    assert!(chaplin
        .properties
        .contains(&("birthYear", PropertyValue::Int(1889))));
}

#[tokio::test]
async fn pages_cover_every_row_once() {
    let films: Vec<_> = (0..25)
        .map(|i| film(&format!("tt{i:07}"), "t", Some(2000)))
        .collect();
    let source = MemorySource::new(films, vec![], vec![]);

    let (report, source, graph, lines) = run_with(source, MemoryGraph::default(), 10).await;

    assert_eq!(source.page_sizes(Table::Films), vec![10, 10, 5]);
    assert_eq!(graph.count(NodeLabel::Film), 25);
    assert_eq!(graph.keys(NodeLabel::Film).len(), 25);

    let films = report.phase(Phase::Films).unwrap();
    assert_eq!(films.total, 25);
    assert_eq!(films.rows_read, 25);
    assert_eq!(films.batches, 3);
    assert_eq!(
        &lines[..3],
        &[
            "10/25 film records exported",
            "20/25 film records exported",
            "25/25 film records exported",
        ]
    );
}

#[tokio::test]
async fn empty_tables_report_zero() {
    let source = MemorySource::new(vec![], vec![], vec![]);
    let (report, source, graph, lines) = run_with(source, MemoryGraph::default(), 10).await;

    assert!(graph.nodes.is_empty());
    assert!(graph.rels.is_empty());
    assert!(source.pages.is_empty());
    assert!(!report.has_failures());
    assert_eq!(
        lines,
        vec![
            "0/0 film records exported",
            "0/0 artist records exported",
            "0/0 relationships exported",
        ]
    );
}

#[tokio::test]
async fn only_exact_categories_become_relationships() {
    let source = MemorySource::new(
        vec![film("tt1", "A", None)],
        vec![artist("nm1", "B", None)],
        vec![
            credit("nm1", "acted in", "tt1"),
            credit("nm1", "directed", "tt1"),
            credit("nm1", "produced", "tt1"),
            credit("nm1", "composed", "tt1"),
            credit("nm1", "Acted In", "tt1"),
            credit("nm1", "acted_in", "tt1"),
            credit("nm1", "writer", "tt1"),
            vec![text("nm1"), SqlValue::Null, text("tt1")],
        ],
    );
    let (report, _, graph, _) = run_with(source, MemoryGraph::default(), 3).await;

    let mut types: Vec<_> = graph.rels.iter().map(|r| r.rel_type.as_str()).collect();
    types.sort();
    assert_eq!(types, vec!["ACTED_IN", "COMPOSED", "DIRECTED", "PRODUCED"]);
    assert_eq!(report.phase(Phase::Relationships).unwrap().dropped, 4);
}

#[tokio::test]
async fn missing_endpoint_creates_nothing() {
    let source = MemorySource::new(
        vec![film("tt1", "A", None)],
        vec![artist("nm1", "B", None)],
        vec![
            credit("nm1", "acted in", "tt404"),
            credit("nm404", "acted in", "tt1"),
            credit("nm1", "acted in", "tt1"),
        ],
    );
    let (_, _, graph, _) = run_with(source, MemoryGraph::default(), 10).await;
    assert_eq!(graph.rels.len(), 1);
}

#[tokio::test]
async fn previous_data_is_deleted_first() {
    let (_, _, stale, _) = run_with(
        MemorySource::new(
            vec![film("old", "Old", None)],
            vec![artist("nm-old", "Old", None)],
            vec![credit("nm-old", "directed", "old")],
        ),
        MemoryGraph::default(),
        10,
    )
    .await;
    assert_eq!(stale.rels.len(), 1);

    let (_, _, graph, _) = run_with(scenario_source(), stale, 10).await;
    assert_eq!(graph.clears, 2);
    assert_eq!(graph.keys(NodeLabel::Film), vec!["film1", "film2", "film3"]);
    assert!(!graph.rels.iter().any(|r| r.start == "nm-old"));
}

#[tokio::test]
async fn rerun_yields_identical_graph() {
    let (_, source, first, _) = run_with(scenario_source(), MemoryGraph::default(), 2).await;
    let snapshot = first.snapshot();

    let (_, _, second, _) = run_with(source, first, 2).await;
    assert_eq!(second.snapshot(), snapshot);
    assert_eq!(second.count(NodeLabel::Film), 3);
    assert_eq!(second.rels.len(), 2);
}

#[tokio::test]
async fn key_indexes_are_created() {
    let (_, _, graph, _) = run_with(scenario_source(), MemoryGraph::default(), 10).await;
    assert!(graph.indexes.contains(&NodeLabel::Film));
    assert!(graph.indexes.contains(&NodeLabel::Artist));
}

#[tokio::test]
async fn undecodable_rows_are_skipped() {
    let source = MemorySource::new(
        vec![
            film("tt1", "A", None),
            vec![SqlValue::Null, text("No id"), SqlValue::Null],
        ],
        vec![],
        vec![],
    );
    let (report, _, graph, lines) = run_with(source, MemoryGraph::default(), 10).await;

    let films = report.phase(Phase::Films).unwrap();
    assert_eq!(films.skipped, 1);
    assert_eq!(films.written, 1);
    assert_eq!(graph.count(NodeLabel::Film), 1);
    assert_eq!(lines[0], "2/2 film records exported");
}

#[tokio::test]
async fn count_failure_aborts_run() {
    let mut source = scenario_source();
    source.fail_count = Some(Table::Artists);

    let mut pipeline =
        Pipeline::with_output(source, MemoryGraph::default(), options(10), Vec::<u8>::new());
    let err = pipeline.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("tArtist"));
    assert_eq!(pipeline.sink().count(NodeLabel::Film), 3);
    assert_eq!(pipeline.sink().count(NodeLabel::Artist), 0);
}
