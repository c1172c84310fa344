//! Hydrate, enrich with model suggestions, analyze, persist, reload

mod common;

use common::{id, LOOSE_DOCUMENT};
use polity::analysis::{AnalysisOutput, AnalysisRequest, BalanceMode, CentralityConfig, CommunityConfig, Coordinator};
use polity::graph::Classification;
use polity::ingest::{self, rules::RuleTable};
use polity::llm::{self, MockModel};
use polity::storage::{self, OpenStore, SnapshotStore, SqliteSnapshotStore};
use polity::{temporal, Outcome, Sign};
use tempfile::TempDir;

const SUGGESTIONS: &str = r#"Here is what the minutes imply:
```json
[
  {"op": "add_node", "id": "westcott", "label": "William Wynn Westcott", "category": "person"},
  {"op": "add_edge", "source": "westcott", "target": "golden-dawn", "relationship": "founded", "confidence": 0.7},
  {"op": "add_edge", "source": "westcott", "target": "mathers", "relationship": "dispute over authority", "sign": -1},
  {"op": "add_edge", "source": "westcott", "target": "nobody", "relationship": "knew"}
]
```"#;

#[tokio::test]
async fn full_session_survives_a_restart() {
    let (mut graph, report) = ingest::load(LOOSE_DOCUMENT).unwrap();
    assert_eq!(report.nodes_added, 4);

    let model = MockModel::available()
        .with_name("mock-7b")
        .with_suggestions(SUGGESTIONS);
    let suggestions = llm::suggest_and_apply(&mut graph, &model, Some(&id("mathers")), 2, &RuleTable::default())
        .await
        .unwrap();
    assert_eq!(suggestions.applied(), 3);
    assert_eq!(suggestions.rejected(), 1);

    let westcott = graph.node(&id("westcott")).unwrap();
    assert_eq!(westcott.provenance()[0].classification, Classification::AiInference);
    let dispute = graph
        .edges()
        .find(|e| e.relationship == "dispute over authority")
        .unwrap();
    assert!(dispute.hypothetical);
    assert_eq!(dispute.sign, Sign::Negative);
    let founded = graph
        .edges()
        .find(|e| e.source() == &id("westcott") && e.relationship == "founded")
        .unwrap();
    assert_eq!(founded.sign, Sign::Positive);
    assert_eq!(founded.provenance()[0].confidence, 0.7);

    let mut coordinator = Coordinator::new(graph);
    coordinator.submit(AnalysisRequest::Community(CommunityConfig::default()));
    coordinator.submit(AnalysisRequest::Centrality(CentralityConfig::default()));
    coordinator.submit(AnalysisRequest::Balance {
        mode: BalanceMode::Compatible,
    });
    let completions = coordinator.drain().await.unwrap();
    assert!(completions
        .iter()
        .all(|c| matches!(c.outcome, Outcome::Applied { .. })));
    match &completions[2].outcome {
        Outcome::Applied {
            output: AnalysisOutput::Balance(report),
            ..
        } => {
            // westcott, mathers, golden-dawn carries one hostile tie; the
            // myth triangle has neutral references
            assert_eq!(report.triangles, 2);
            assert_eq!(report.balanced, 0);
            assert_eq!(report.frustration_index, 1.0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshots.db");
    {
        let store = SqliteSnapshotStore::open(&path).unwrap();
        let info = storage::save_graph(&store, "after-suggestions", coordinator.graph(), coordinator.generation())
            .unwrap();
        assert_eq!(info.node_count, coordinator.graph().node_count());
    }

    let store = SqliteSnapshotStore::open(&path).unwrap();
    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    let restored = storage::load_graph(&store, "after-suggestions").unwrap();
    assert_eq!(&restored, coordinator.graph());
    assert!(restored.nodes().all(|n| n.community().is_some() && n.centrality().is_some()));
}

#[tokio::test]
async fn analysis_of_a_year_view_leaves_the_full_graph_alone() {
    let (graph, _) = ingest::load(LOOSE_DOCUMENT).unwrap();
    let view = temporal::visible_view(&graph, 1910);
    assert_eq!(view.node_count(), 4);

    let mut coordinator = Coordinator::new(view);
    let completion = coordinator
        .run(AnalysisRequest::Community(CommunityConfig::default()))
        .await
        .unwrap();
    match completion.outcome {
        Outcome::Applied { summary, .. } => assert_eq!(summary.updated, 4),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(coordinator.graph().node(&id("golden-dawn")).is_none());
    assert!(graph.node(&id("golden-dawn")).unwrap().community().is_none());
}
