use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use photograph_embed::{EncodeError, Encoder, MemoryEncoder, Source};
use photograph_projection::ProjectorConfig;
use photograph_store::{
    DataPoint, MemoryStore, ModelStore, ProjectedPoint, RedbStore, StoreError, StoredEmbedding,
    VectorRepository,
};

use crate::error::PipelineError;
use crate::pipeline::PipelineConfig;
use crate::service::{Service, ServiceConfig};
use crate::types::{IngestItem, IngestRequest, QueryMode, QueryRequest};

const DIM: usize = 4;
const CAP: usize = 3;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Delays selected sources before delegating to a MemoryEncoder.
struct SlowEncoder {
    inner: MemoryEncoder,
    slow: HashSet<String>,
    delay: Duration,
}

#[async_trait::async_trait]
impl Encoder for SlowEncoder {
    async fn encode(&self, source: &Source) -> Result<Vec<f32>, EncodeError> {
        if self.slow.contains(source.as_str()) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.encode(source).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

/// Has no models and refuses to save any.
struct FailingModelStore;

impl ModelStore for FailingModelStore {
    fn load_model(&self, _project_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }

    fn save_model(&self, _project_id: &str, _blob: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }
}

/// Fails model reads while `down` is set.
struct UnreachableModelStore {
    inner: MemoryStore,
    down: Arc<AtomicBool>,
}

impl ModelStore for UnreachableModelStore {
    fn load_model(&self, project_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("connection refused".into()));
        }
        self.inner.load_model(project_id)
    }

    fn save_model(&self, project_id: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.inner.save_model(project_id, blob)
    }
}

/// Stalls every model load, widening the read-modify-write window.
struct SlowModelStore {
    inner: MemoryStore,
    delay: Duration,
}

impl ModelStore for SlowModelStore {
    fn load_model(&self, project_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.load_model(project_id)
    }

    fn save_model(&self, project_id: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.inner.save_model(project_id, blob)
    }
}

/// Rejects embedding writes for one data point id.
struct FlakyRepo {
    inner: MemoryStore,
    reject: String,
}

impl VectorRepository for FlakyRepo {
    fn put_embedding(&self, record: &StoredEmbedding) -> Result<(), StoreError> {
        if record.point.id == self.reject {
            return Err(StoreError::Storage("connection reset".into()));
        }
        self.inner.put_embedding(record)
    }

    fn embeddings(&self, project_id: &str) -> Result<Vec<StoredEmbedding>, StoreError> {
        self.inner.embeddings(project_id)
    }

    fn put_projections(
        &self,
        project_id: &str,
        points: &[ProjectedPoint],
    ) -> Result<(), StoreError> {
        self.inner.put_projections(project_id, points)
    }

    fn projections(&self, project_id: &str) -> Result<Vec<ProjectedPoint>, StoreError> {
        self.inner.projections(project_id)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn url(i: usize) -> String {
    format!("https://img/{i}.png")
}

fn vector(i: usize) -> Vec<f32> {
    let x = i as f32 + 1.0;
    vec![x.sin(), (0.7 * x).cos(), 0.1 * x, 2.0 * (1.3 * x).sin()]
}

fn encoder(n: usize) -> MemoryEncoder {
    let enc = MemoryEncoder::new(DIM);
    for i in 0..n {
        enc.insert(Source::Ref(url(i)), vector(i));
    }
    enc
}

fn items(range: std::ops::Range<usize>) -> Vec<IngestItem> {
    range.map(|i| IngestItem::new(format!("p{i}"), url(i))).collect()
}

fn ingest(project_id: &str, items: Vec<IngestItem>) -> IngestRequest {
    IngestRequest {
        project_id: project_id.into(),
        items,
    }
}

fn config(
    repo: Arc<dyn VectorRepository>,
    models: Arc<dyn ModelStore>,
    encoder: Arc<dyn Encoder>,
) -> ServiceConfig {
    ServiceConfig {
        repo,
        models,
        encoder,
        projector: ProjectorConfig {
            dim: DIM,
            max_components: CAP,
        },
        pipeline: PipelineConfig {
            encode_timeout: Duration::from_millis(500),
            max_concurrency: 4,
        },
    }
}

fn service(store: &MemoryStore, enc: impl Encoder + 'static) -> Service {
    Service::new(config(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(enc),
    ))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_fits_model_and_projects_every_point() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(5));

    let resp = svc.ingest(&ingest("p", items(0..5))).await.unwrap();
    assert_eq!(resp.processed, 5);

    let model = svc.model("p").unwrap().unwrap();
    assert_eq!(model.k, 3);
    assert_eq!(model.n, 5);
    assert_eq!(model.dim, DIM);

    let points = svc.points("p").unwrap();
    assert_eq!(points.len(), 5);
    assert!(points.iter().all(|p| p.coords.len() == 3));
    assert_eq!(points[0].data_point_id, "p0");
    assert_eq!(points[0].label, url(0));
    assert_eq!(points[0].source_ref, url(0));
}

#[tokio::test]
async fn explicit_label_is_stored() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(1));
    let item = IngestItem::new("p0", url(0)).with_label("cat.png");
    svc.ingest(&ingest("p", vec![item])).await.unwrap();
    assert_eq!(svc.points("p").unwrap()[0].label, "cat.png");
}

#[tokio::test]
async fn failed_items_are_skipped() {
    let store = MemoryStore::new();
    let enc = encoder(4);
    enc.insert(Source::Ref("https://img/short.png".into()), vec![1.0, 2.0]);
    let svc = service(&store, enc);

    let mut batch = items(0..4);
    batch.insert(1, IngestItem::new("ghost", "https://img/missing.png"));
    batch.push(IngestItem::new("short", "https://img/short.png"));

    let resp = svc.ingest(&ingest("p", batch)).await.unwrap();
    assert_eq!(resp.processed, 4);
    assert_eq!(svc.model("p").unwrap().unwrap().n, 4);

    let stored: Vec<String> = store
        .embeddings("p")
        .unwrap()
        .into_iter()
        .map(|e| e.point.id)
        .collect();
    assert_eq!(stored, vec!["p0", "p1", "p2", "p3"]);
    assert_eq!(svc.points("p").unwrap().len(), 4);
}

#[tokio::test]
async fn timed_out_item_is_skipped() {
    let store = MemoryStore::new();
    let enc = SlowEncoder {
        inner: encoder(4),
        slow: HashSet::from([url(2)]),
        delay: Duration::from_secs(30),
    };
    let mut cfg = config(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(enc),
    );
    cfg.pipeline.encode_timeout = Duration::from_millis(50);
    let svc = Service::new(cfg).unwrap();

    let resp = svc.ingest(&ingest("p", items(0..4))).await.unwrap();
    assert_eq!(resp.processed, 3);
    assert!(store.embeddings("p").unwrap().iter().all(|e| e.point.id != "p2"));
    assert_eq!(svc.model("p").unwrap().unwrap().n, 3);
}

#[tokio::test]
async fn repository_write_failure_excludes_item() {
    let store = MemoryStore::new();
    let repo = FlakyRepo {
        inner: store.clone(),
        reject: "p1".into(),
    };
    let svc = Service::new(config(
        Arc::new(repo),
        Arc::new(store.clone()),
        Arc::new(encoder(3)),
    ))
    .unwrap();

    let resp = svc.ingest(&ingest("p", items(0..3))).await.unwrap();
    assert_eq!(resp.processed, 2);
    assert_eq!(store.embeddings("p").unwrap().len(), 2);
}

#[tokio::test]
async fn coordinates_follow_latest_model() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(7));

    svc.ingest(&ingest("p", items(0..3))).await.unwrap();
    let before = svc.points("p").unwrap();
    svc.ingest(&ingest("p", items(3..7))).await.unwrap();
    let after = svc.points("p").unwrap();
    assert_eq!(before.len(), 3);
    assert_eq!(after.len(), 7);

    // Every stored coordinate, old points included, comes from the
    // current model.
    let projector = svc.pipeline().projector();
    let model = projector.load("p").unwrap().unwrap();
    let vectors: Vec<Vec<f32>> = store
        .embeddings("p")
        .unwrap()
        .iter()
        .map(|e| e.vector().unwrap())
        .collect();
    let want = projector.transform(&model, &vectors).unwrap();
    let got: Vec<Vec<f32>> = after.into_iter().map(|p| p.coords).collect();
    assert_eq!(got, want);
}

#[tokio::test]
async fn k_stays_fixed_across_runs() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(12));

    svc.ingest(&ingest("p", items(0..2))).await.unwrap();
    assert_eq!(svc.model("p").unwrap().unwrap().k, 2);

    svc.ingest(&ingest("p", items(2..7))).await.unwrap();
    svc.ingest(&ingest("p", items(7..12))).await.unwrap();
    let model = svc.model("p").unwrap().unwrap();
    assert_eq!(model.k, 2);
    assert_eq!(model.n, 12);
    assert!(svc.points("p").unwrap().iter().all(|p| p.coords.len() == 2));
}

#[tokio::test]
async fn nothing_embedded_without_model_is_noop() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(0));

    let resp = svc.ingest(&ingest("p", items(0..3))).await.unwrap();
    assert_eq!(resp.processed, 0);
    assert!(svc.model("p").unwrap().is_none());
    assert!(store.projections("p").unwrap().is_empty());
    assert!(store.load_model("p").unwrap().is_none());
}

#[tokio::test]
async fn empty_delta_keeps_model() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(4));

    svc.ingest(&ingest("p", items(0..4))).await.unwrap();
    let blob = store.load_model("p").unwrap().unwrap();
    let coords = svc.points("p").unwrap();

    let resp = svc
        .ingest(&ingest("p", vec![IngestItem::new("ghost", "https://img/missing.png")]))
        .await
        .unwrap();
    assert_eq!(resp.processed, 0);
    assert_eq!(store.load_model("p").unwrap().unwrap(), blob);
    assert_eq!(svc.points("p").unwrap(), coords);
}

#[tokio::test]
async fn corrupt_model_is_refitted() {
    let store = MemoryStore::new();
    store.save_model("p", b"\xc1garbage").unwrap();
    let svc = service(&store, encoder(3));

    let resp = svc.ingest(&ingest("p", items(0..3))).await.unwrap();
    assert_eq!(resp.processed, 3);
    let model = svc.model("p").unwrap().unwrap();
    assert_eq!(model.n, 3);
    assert_eq!(model.k, 3);
}

#[tokio::test]
async fn model_save_failure_is_reported() {
    let store = MemoryStore::new();
    let svc = Service::new(config(
        Arc::new(store.clone()),
        Arc::new(FailingModelStore),
        Arc::new(encoder(3)),
    ))
    .unwrap();

    let err = svc.ingest(&ingest("p", items(0..3))).await.unwrap_err();
    assert!(matches!(err, PipelineError::Persist(_)), "got {err:?}");
    // Embeddings stay; no coordinates were written for an unsaved model.
    assert_eq!(store.embeddings("p").unwrap().len(), 3);
    assert!(store.projections("p").unwrap().is_empty());
}

#[tokio::test]
async fn model_read_failure_keeps_model() {
    let store = MemoryStore::new();
    let down = Arc::new(AtomicBool::new(false));
    let models = UnreachableModelStore {
        inner: store.clone(),
        down: Arc::clone(&down),
    };
    let svc = Service::new(config(
        Arc::new(store.clone()),
        Arc::new(models),
        Arc::new(encoder(12)),
    ))
    .unwrap();

    svc.ingest(&ingest("p", items(0..2))).await.unwrap();
    svc.ingest(&ingest("p", items(2..8))).await.unwrap();
    let blob = store.load_model("p").unwrap().unwrap();

    down.store(true, Ordering::SeqCst);
    let err = svc.ingest(&ingest("p", items(8..12))).await.unwrap_err();
    assert!(matches!(err, PipelineError::Persist(_)), "got {err:?}");
    assert!(matches!(svc.model("p"), Err(PipelineError::Persist(_))));
    assert_eq!(store.load_model("p").unwrap().unwrap(), blob);

    down.store(false, Ordering::SeqCst);
    let model = svc.model("p").unwrap().unwrap();
    assert_eq!((model.k, model.n), (2, 8));
}

#[tokio::test]
async fn failed_reprojection_writes_nothing() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(8));

    svc.ingest(&ingest("p", items(0..4))).await.unwrap();
    let blob = store.load_model("p").unwrap().unwrap();
    let coords = store.projections("p").unwrap();

    store
        .put_embedding(&StoredEmbedding::new(
            DataPoint {
                id: "short".into(),
                project_id: "p".into(),
                label: "short".into(),
                source_ref: "https://img/short.png".into(),
            },
            vec![1.0, 2.0],
        ))
        .unwrap();

    let err = svc.ingest(&ingest("p", items(4..8))).await.unwrap_err();
    assert!(
        matches!(err, PipelineError::DimensionMismatch { got: 2, want: 4 }),
        "got {err:?}"
    );
    assert_eq!(store.load_model("p").unwrap().unwrap(), blob);
    assert_eq!(svc.model("p").unwrap().unwrap().n, 4);
    assert_eq!(store.projections("p").unwrap(), coords);
}

#[tokio::test]
async fn invalid_request_does_no_work() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(3));
    let err = svc.ingest(&ingest("p", vec![])).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    let err = svc.ingest(&ingest("", items(0..3))).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(store.embeddings("p").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingests_keep_every_update() {
    let store = MemoryStore::new();
    let models = SlowModelStore {
        inner: store.clone(),
        delay: Duration::from_millis(30),
    };
    let svc = Arc::new(
        Service::new(config(
            Arc::new(store.clone()),
            Arc::new(models),
            Arc::new(encoder(12)),
        ))
        .unwrap(),
    );

    let a = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.ingest(&ingest("p", items(0..5))).await })
    };
    let b = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.ingest(&ingest("p", items(5..12))).await })
    };
    let (a, b) = tokio::join!(a, b);
    assert_eq!(a.unwrap().unwrap().processed, 5);
    assert_eq!(b.unwrap().unwrap().processed, 7);

    let model = svc.model("p").unwrap().unwrap();
    assert_eq!(model.n, 12);
    assert_eq!(svc.points("p").unwrap().len(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn projects_are_isolated() {
    let store = MemoryStore::new();
    let svc = Arc::new(service(&store, encoder(8)));

    let a = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.ingest(&ingest("a", items(0..2))).await })
    };
    let b = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.ingest(&ingest("b", items(2..8))).await })
    };
    let (a, b) = tokio::join!(a, b);
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    assert_eq!(svc.model("a").unwrap().unwrap().n, 2);
    assert_eq!(svc.model("a").unwrap().unwrap().k, 2);
    assert_eq!(svc.model("b").unwrap().unwrap().n, 6);
    assert_eq!(svc.model("b").unwrap().unwrap().k, 3);
    assert_eq!(svc.points("a").unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn query_by_source_ranks_exact_match_first() {
    let store = MemoryStore::new();
    let enc = MemoryEncoder::new(DIM)
        .with(Source::Ref("a".into()), vec![1.0, 0.0, 0.0, 0.0])
        .with(Source::Ref("b".into()), vec![0.0, 1.0, 0.0, 0.0]);
    let svc = service(&store, enc);
    svc.ingest(&ingest(
        "p",
        vec![IngestItem::new("A", "a"), IngestItem::new("B", "b")],
    ))
    .await
    .unwrap();

    let mut req = QueryRequest::new("p", QueryMode::VectorSource, "a");
    req.top_k = 2;
    let results = svc.query(&req).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.data_point_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(results[0].similarity, 1.0);
    assert_eq!(results[1].similarity, 0.0);
}

#[tokio::test]
async fn query_by_text() {
    let store = MemoryStore::new();
    let enc = encoder(5).with(Source::Text("something like three".into()), vector(3));
    let svc = service(&store, enc);
    svc.ingest(&ingest("p", items(0..5))).await.unwrap();

    let results = svc
        .query(&QueryRequest::new("p", QueryMode::Text, "something like three"))
        .await
        .unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].data_point_id, "p3");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
    assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn query_empty_project_is_no_embeddings() {
    let store = MemoryStore::new();
    let enc = MemoryEncoder::new(DIM).with(Source::Text("q".into()), vec![1.0; DIM]);
    let svc = service(&store, enc);
    let err = svc
        .query(&QueryRequest::new("empty", QueryMode::Text, "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoEmbeddings(ref p) if p == "empty"));
}

#[tokio::test]
async fn query_encode_failure_is_external_fetch() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(2));
    svc.ingest(&ingest("p", items(0..2))).await.unwrap();
    let err = svc
        .query(&QueryRequest::new("p", QueryMode::Text, "unknown"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::ExternalFetch(_)));
}

#[tokio::test]
async fn query_rejects_zero_top_k() {
    let store = MemoryStore::new();
    let svc = service(&store, encoder(1));
    let mut req = QueryRequest::new("p", QueryMode::Text, "x");
    req.top_k = 0;
    assert!(matches!(
        svc.query(&req).await,
        Err(PipelineError::Validation(_))
    ));
}

// ---------------------------------------------------------------------------
// Construction and persistence
// ---------------------------------------------------------------------------

#[test]
fn service_rejects_encoder_dimension_mismatch() {
    let store = MemoryStore::new();
    let result = Service::new(config(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(MemoryEncoder::new(DIM + 1)),
    ));
    assert!(matches!(
        result,
        Err(PipelineError::DimensionMismatch { got: 5, want: 4 })
    ));
}

#[tokio::test]
async fn redb_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photograph.redb");

    let open = |n: usize| {
        let db = Arc::new(RedbStore::open(&path).unwrap());
        Service::new(config(db.clone(), db, Arc::new(encoder(n)))).unwrap()
    };

    {
        let svc = open(7);
        assert_eq!(svc.ingest(&ingest("p", items(0..5))).await.unwrap().processed, 5);
    }

    let svc = open(7);
    let model = svc.model("p").unwrap().unwrap();
    assert_eq!((model.k, model.n), (3, 5));
    assert_eq!(svc.points("p").unwrap().len(), 5);

    svc.ingest(&ingest("p", items(5..7))).await.unwrap();
    assert_eq!(svc.model("p").unwrap().unwrap().n, 7);
    assert_eq!(svc.points("p").unwrap().len(), 7);
}
