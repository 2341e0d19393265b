//! End-to-end session tests against a scripted in-memory data source.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use lineage_core::{
    Direction, EntityKey, EntityRef, LineageConfig, LineageDataSource, LineageError,
    LineageResponse, Result, WireEdge, WireEntity,
};
use lineage_graph::{ExpandOutcome, ExpansionPhase, LayeredLayout, LineageSession};

fn wire_entity(id: &str, fqn: &str) -> WireEntity {
    WireEntity {
        id: id.to_string(),
        fully_qualified_name: Some(fqn.to_string()),
        name: fqn.rsplit('.').next().unwrap_or(fqn).to_string(),
        display_name: None,
        entity_type: "table".to_string(),
        description: None,
        deleted: None,
    }
}

fn wire_edge(from: &str, to: &str) -> WireEdge {
    WireEdge {
        from_entity: EntityRef {
            id: format!("id-{from}"),
            fully_qualified_name: Some(from.to_string()),
        },
        to_entity: EntityRef {
            id: format!("id-{to}"),
            fully_qualified_name: Some(to.to_string()),
        },
    }
}

fn response(
    nodes: Vec<WireEntity>,
    edges: Vec<WireEdge>,
    center: Option<WireEntity>,
) -> LineageResponse {
    LineageResponse {
        nodes,
        edges,
        center_node: center,
    }
}

fn empty_response() -> LineageResponse {
    response(vec![], vec![], None)
}

#[derive(Clone)]
enum Reply {
    Answer(LineageResponse),
    Fail(String),
    Hang,
}

/// Scripted data source: one initial response plus queued per-(node,
/// direction) expansion replies. Counts expansion fetches so tests can
/// assert that cache-served re-expands never touch the network.
struct StubSource {
    initial: LineageResponse,
    expansions: Mutex<HashMap<(String, Direction), VecDeque<Reply>>>,
    expand_calls: AtomicUsize,
}

impl StubSource {
    fn new(initial: LineageResponse) -> Self {
        Self {
            initial,
            expansions: Mutex::new(HashMap::new()),
            expand_calls: AtomicUsize::new(0),
        }
    }

    fn script(self, node_fqn: &str, direction: Direction, reply: Reply) -> Self {
        self.expansions
            .lock()
            .entry((node_fqn.to_string(), direction))
            .or_default()
            .push_back(reply);
        self
    }

    fn expand_calls(&self) -> usize {
        self.expand_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LineageDataSource for StubSource {
    async fn get_lineage(&self, _fqn: &str, _entity_type: &str) -> Result<LineageResponse> {
        Ok(self.initial.clone())
    }

    async fn expand_lineage(
        &self,
        _center_fqn: &str,
        node_id: &str,
        direction: Direction,
        _entity_type: &str,
    ) -> Result<LineageResponse> {
        self.expand_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .expansions
            .lock()
            .get_mut(&(node_id.to_string(), direction))
            .and_then(|queue| queue.pop_front());
        match reply {
            Some(Reply::Answer(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(LineageError::Fetch(message)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(empty_response())
            }
            None => Ok(empty_response()),
        }
    }
}

/// orders with customers and order_items upstream of it.
fn orders_initial() -> LineageResponse {
    response(
        vec![
            wire_entity("1", "db.schema.orders"),
            wire_entity("2", "db.schema.customers"),
            wire_entity("3", "db.schema.order_items"),
        ],
        vec![
            wire_edge("db.schema.customers", "db.schema.orders"),
            wire_edge("db.schema.order_items", "db.schema.orders"),
        ],
        Some(wire_entity("1", "db.schema.orders")),
    )
}

async fn open_session(source: Arc<StubSource>) -> LineageSession {
    open_session_on(source, "db.schema.orders").await
}

async fn open_session_on(source: Arc<StubSource>, fqn: &str) -> LineageSession {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    LineageSession::open(
        &LineageConfig::default(),
        source,
        Arc::new(LayeredLayout::default()),
        fqn,
        "table",
    )
    .await
    .expect("session opens")
}

#[tokio::test]
async fn initial_merge_matches_orders_scenario() {
    let session = open_session(Arc::new(StubSource::new(orders_initial()))).await;

    assert_eq!(session.entity_count(), 3);
    assert_eq!(session.edge_count(), 2);
    assert!(session.classification(&"db.schema.customers".into()).is_upstream);
    assert!(session.classification(&"db.schema.order_items".into()).is_upstream);
    assert_eq!(session.center(), &EntityKey::new("db.schema.orders"));
}

#[tokio::test]
async fn empty_expand_records_no_known_connections() {
    let source = Arc::new(
        StubSource::new(orders_initial()).script(
            "db.schema.customers",
            Direction::Upstream,
            Reply::Answer(empty_response()),
        ),
    );
    let session = open_session(source).await;

    let customers: EntityKey = "db.schema.customers".into();
    let outcome = session.expand(&customers, Direction::Upstream).await;

    assert_eq!(outcome, ExpandOutcome::NoConnections);
    let state = session.direction_state(&customers, Direction::Upstream);
    assert_eq!(state.has_known_connections, Some(false));
    assert_eq!(state.phase, ExpansionPhase::Expanded);
    // nothing layout-relevant changed
    assert_eq!(session.entity_count(), 3);
    assert_eq!(session.edge_count(), 2);
}

#[tokio::test]
async fn expand_merges_incrementally_and_is_idempotent() {
    let suppliers = response(
        vec![wire_entity("4", "db.schema.suppliers")],
        vec![wire_edge("db.schema.suppliers", "db.schema.customers")],
        None,
    );
    let source = Arc::new(
        StubSource::new(orders_initial())
            .script(
                "db.schema.customers",
                Direction::Upstream,
                Reply::Answer(suppliers.clone()),
            )
            .script(
                "db.schema.customers",
                Direction::Upstream,
                Reply::Answer(suppliers),
            ),
    );
    let session = open_session(source).await;
    let customers: EntityKey = "db.schema.customers".into();

    let first = session.expand(&customers, Direction::Upstream).await;
    match first {
        ExpandOutcome::Expanded(outcome) => {
            assert_eq!(outcome.added_entities, vec![EntityKey::new("db.schema.suppliers")]);
            assert_eq!(outcome.added_edges.len(), 1);
        }
        other => panic!("expected Expanded, got {other:?}"),
    }
    assert!(session.classification(&"db.schema.suppliers".into()).is_upstream);
    assert_eq!(
        session
            .direction_state(&customers, Direction::Upstream)
            .has_known_connections,
        Some(true)
    );

    // Re-merging the identical fetch adds nothing.
    let second = session.expand(&customers, Direction::Upstream).await;
    match second {
        ExpandOutcome::Expanded(outcome) => assert!(outcome.is_empty()),
        other => panic!("expected Expanded, got {other:?}"),
    }
    assert_eq!(session.entity_count(), 4);
    assert_eq!(session.edge_count(), 3);
}

#[tokio::test]
async fn collapse_then_reexpand_restores_subgraph_without_refetch() {
    let suppliers = response(
        vec![wire_entity("4", "db.schema.suppliers")],
        vec![wire_edge("db.schema.suppliers", "db.schema.customers")],
        None,
    );
    let source = Arc::new(StubSource::new(orders_initial()).script(
        "db.schema.customers",
        Direction::Upstream,
        Reply::Answer(suppliers),
    ));
    let session = open_session(source.clone()).await;
    let customers: EntityKey = "db.schema.customers".into();

    session.expand(&customers, Direction::Upstream).await;
    let before = session.snapshot();
    let fetches_before = source.expand_calls();

    let pruned = session.collapse(&customers, Direction::Upstream);
    assert_eq!(pruned.removed_entities.len(), 1);
    assert_eq!(session.entity_count(), 3);
    assert!(session
        .direction_state(&customers, Direction::Upstream)
        .is_collapsed());

    let outcome = session.expand(&customers, Direction::Upstream).await;
    assert!(matches!(outcome, ExpandOutcome::Expanded(_)));
    let after = session.snapshot();

    assert_eq!(source.expand_calls(), fetches_before, "restore is local");
    let mut before_keys: Vec<String> =
        before.entities.iter().map(|e| e.key().to_string()).collect();
    let mut after_keys: Vec<String> =
        after.entities.iter().map(|e| e.key().to_string()).collect();
    before_keys.sort();
    after_keys.sort();
    assert_eq!(before_keys, after_keys);
    assert_eq!(before.edges, after.edges);
}

#[tokio::test]
async fn repeated_collapse_keeps_the_stashed_subgraph() {
    let suppliers = response(
        vec![wire_entity("4", "db.schema.suppliers")],
        vec![wire_edge("db.schema.suppliers", "db.schema.customers")],
        None,
    );
    let source = Arc::new(StubSource::new(orders_initial()).script(
        "db.schema.customers",
        Direction::Upstream,
        Reply::Answer(suppliers),
    ));
    let session = open_session(source.clone()).await;
    let customers: EntityKey = "db.schema.customers".into();

    session.expand(&customers, Direction::Upstream).await;
    assert_eq!(session.entity_count(), 4);

    let first = session.collapse(&customers, Direction::Upstream);
    assert_eq!(first.removed_entities.len(), 1);

    // second collapse of the same pair: no-op, not a destructive re-prune
    let second = session.collapse(&customers, Direction::Upstream);
    assert!(second.is_empty());
    assert!(session
        .direction_state(&customers, Direction::Upstream)
        .is_collapsed());

    let fetches_before = source.expand_calls();
    let outcome = session.expand(&customers, Direction::Upstream).await;
    assert!(matches!(outcome, ExpandOutcome::Expanded(_)));

    assert_eq!(source.expand_calls(), fetches_before, "restore is local");
    assert_eq!(session.entity_count(), 4, "suppliers restored after re-expand");
    let snapshot = session.snapshot();
    assert!(snapshot
        .entities
        .iter()
        .any(|e| e.fqn == "db.schema.suppliers"));
    assert!(snapshot.edges.contains(&(
        "db.schema.suppliers".into(),
        "db.schema.customers".into()
    )));
}

#[tokio::test]
async fn shared_upstream_node_survives_until_every_path_collapses() {
    // a feeds c through both b1 and b2
    let initial = response(
        vec![
            wire_entity("1", "c"),
            wire_entity("2", "a"),
            wire_entity("3", "b1"),
            wire_entity("4", "b2"),
        ],
        vec![
            wire_edge("a", "b1"),
            wire_edge("b1", "c"),
            wire_edge("a", "b2"),
            wire_edge("b2", "c"),
        ],
        Some(wire_entity("1", "c")),
    );
    let session = open_session_on(Arc::new(StubSource::new(initial)), "c").await;

    let first = session.collapse(&"b1".into(), Direction::Upstream);
    assert!(first.removed_entities.is_empty(), "a is retained via b2");
    assert_eq!(session.entity_count(), 4);

    let second = session.collapse(&"b2".into(), Direction::Upstream);
    assert_eq!(second.removed_entities.len(), 1);
    assert_eq!(second.removed_entities[0].fqn, "a");
    assert_eq!(session.entity_count(), 3);

    // invariant: no dangling edges in any state we passed through
    let snapshot = session.snapshot();
    let keys: Vec<EntityKey> = snapshot.entities.iter().map(|e| e.key()).collect();
    for (from, to) in &snapshot.edges {
        assert!(keys.contains(from) && keys.contains(to));
    }
}

#[tokio::test]
async fn fetch_failure_sets_error_state_and_leaves_graph_intact() {
    let source = Arc::new(StubSource::new(orders_initial()).script(
        "db.schema.customers",
        Direction::Upstream,
        Reply::Fail("connection refused".to_string()),
    ));
    let session = open_session(source).await;
    let customers: EntityKey = "db.schema.customers".into();

    let outcome = session.expand(&customers, Direction::Upstream).await;
    assert!(matches!(outcome, ExpandOutcome::Failed(_)));

    let state = session.direction_state(&customers, Direction::Upstream);
    assert!(state.error().unwrap().contains("connection refused"));
    assert_eq!(session.entity_count(), 3);
    assert_eq!(session.edge_count(), 2);

    // the failed pair can be retried
    let retry = session.expand(&customers, Direction::Upstream).await;
    assert_eq!(retry, ExpandOutcome::NoConnections);
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_without_blocking_other_pairs() {
    let source = Arc::new(
        StubSource::new(orders_initial())
            .script("db.schema.customers", Direction::Upstream, Reply::Hang)
            .script(
                "db.schema.order_items",
                Direction::Upstream,
                Reply::Answer(empty_response()),
            ),
    );
    let session = Arc::new(open_session(source).await);
    let customers: EntityKey = "db.schema.customers".into();

    let hung = {
        let session = session.clone();
        let customers = customers.clone();
        tokio::spawn(async move { session.expand(&customers, Direction::Upstream).await })
    };
    tokio::task::yield_now().await;

    // second request on the same pair is refused while the first hangs
    assert_eq!(
        session.expand(&customers, Direction::Upstream).await,
        ExpandOutcome::AlreadyInFlight
    );

    // a different pair proceeds independently
    let other = session
        .expand(&"db.schema.order_items".into(), Direction::Upstream)
        .await;
    assert_eq!(other, ExpandOutcome::NoConnections);

    // the hung fetch converts into a timeout error, not a wedged session
    let outcome = hung.await.unwrap();
    assert!(matches!(outcome, ExpandOutcome::Failed(_)));
    assert!(session
        .direction_state(&customers, Direction::Upstream)
        .error()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn open_fails_when_center_is_missing() {
    let initial = response(
        vec![wire_entity("2", "db.schema.customers")],
        vec![],
        None,
    );
    let result = LineageSession::open(
        &LineageConfig::default(),
        Arc::new(StubSource::new(initial)),
        Arc::new(LayeredLayout::default()),
        "db.schema.orders",
        "table",
    )
    .await;

    assert!(matches!(result, Err(LineageError::CenterNotFound(_))));
}

#[tokio::test]
async fn close_clears_the_whole_session() {
    let session = open_session(Arc::new(StubSource::new(orders_initial()))).await;
    session.close();

    assert_eq!(session.entity_count(), 0);
    assert_eq!(session.edge_count(), 0);
    let state = session.direction_state(&"db.schema.customers".into(), Direction::Upstream);
    assert_eq!(state.phase, ExpansionPhase::Idle);
}

#[tokio::test]
async fn positioned_snapshot_places_every_entity() {
    let session = open_session(Arc::new(StubSource::new(orders_initial()))).await;
    let positioned = session
        .positioned()
        .await
        .unwrap()
        .expect("latest layout request is applied");

    assert_eq!(positioned.positions.len(), 3);
    let orders = &positioned.positions["db.schema.orders"];
    let customers = &positioned.positions["db.schema.customers"];
    assert!(customers.x < orders.x, "upstream is laid out left of center");
}
