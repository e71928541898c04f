use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{Cidade, NewOficio, OficioChanges, OficioSubmission},
    error::StoreResult,
    protocol::{OficioPage, OficioQuery},
};
use storage::Storage;

/// Counts calls and can misreport the maximum or refuse inserts.
struct TestStore {
    inner: Storage,
    max_reads: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    stale_max_reads: usize,
    always_conflict: bool,
}

impl TestStore {
    async fn new() -> Self {
        Self {
            inner: Storage::new("sqlite::memory:").await.expect("db"),
            max_reads: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            stale_max_reads: 0,
            always_conflict: false,
        }
    }

    fn writes(&self) -> usize {
        self.inserts.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OficioStore for TestStore {
    async fn fetch_page(&self, query: &OficioQuery) -> StoreResult<OficioPage> {
        self.inner.fetch_page(query).await
    }

    async fn fetch_by_id(&self, id: OficioId) -> StoreResult<Option<Oficio>> {
        self.inner.fetch_by_id(id).await
    }

    async fn max_numero(&self) -> StoreResult<Option<i64>> {
        let read = self.max_reads.fetch_add(1, Ordering::SeqCst);
        let max = self.inner.max_numero().await?;
        if read < self.stale_max_reads {
            return Ok(max.map(|m| m - 1).filter(|m| *m > 0));
        }
        Ok(max)
    }

    async fn insert(&self, record: &NewOficio) -> StoreResult<Oficio> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.always_conflict {
            return Err(StoreError::Conflict("numero taken".into()));
        }
        self.inner.insert(record).await
    }

    async fn update(&self, id: OficioId, changes: &OficioChanges) -> StoreResult<Oficio> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(id, changes).await
    }
}

#[async_trait]
impl OficioFunctions for TestStore {
    async fn add_oficio(&self, submission: &OficioSubmission) -> StoreResult<Option<Oficio>> {
        let numero = self.inner.max_numero().await?.unwrap_or_default() + 1;
        let created = self
            .inner
            .insert(&NewOficio {
                numero,
                ano: submission.ano,
                remetente: submission.remetente.clone(),
                destinatario: submission.destinatario.clone(),
                cidade: submission.cidade,
                utilizado: submission.utilizado,
                descricao: submission.descricao.clone(),
                assunto: None,
                data_envio: None,
            })
            .await?;
        Ok(Some(created))
    }
}

fn form(remetente: &str, destinatario: &str, ano: i32) -> OficioForm {
    let mut form = OficioForm::new(ano);
    form.remetente = remetente.into();
    form.destinatario = destinatario.into();
    form
}

async fn seed(store: &TestStore, numero: i64) -> Oficio {
    store
        .inner
        .insert(&NewOficio {
            numero,
            ano: 2023,
            remetente: "Seed".into(),
            destinatario: "Seed".into(),
            cidade: Cidade::Crateus,
            utilizado: false,
            descricao: None,
            assunto: None,
            data_envio: None,
        })
        .await
        .expect("seed")
}

#[tokio::test]
async fn create_numbers_after_existing_max() {
    let store = TestStore::new().await;
    seed(&store, 7).await;
    let service = OficioService::new(store);

    let created = service.create(&form("A", "B", 2024)).await.expect("create");
    assert_eq!(created.numero, 8);
    assert_eq!(created.ano, 2024);
    assert_eq!(created.remetente, "A");
    assert_eq!(created.destinatario, "B");
    assert!(!created.utilizado);
}

#[tokio::test]
async fn numbering_ignores_year() {
    let store = TestStore::new().await;
    seed(&store, 41).await;
    let service = OficioService::new(store);

    let created = service.create(&form("A", "B", 2030)).await.expect("create");
    assert_eq!(created.numero, 42);
}

#[tokio::test]
async fn first_record_gets_numero_one() {
    let service = OficioService::new(TestStore::new().await);
    let created = service.create(&form("A", "B", 2024)).await.expect("create");
    assert_eq!(created.numero, 1);
}

#[tokio::test]
async fn empty_sender_fails_validation_without_any_request() {
    let service = OficioService::new(TestStore::new().await);

    let err = service
        .create(&form("", "B", 2024))
        .await
        .expect_err("validation");
    assert!(matches!(err, OficioError::Validation(_)));
    assert_eq!(service.store().writes(), 0);
    assert_eq!(service.store().max_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lost_numbering_race_is_retried_with_fresh_max() {
    let mut store = TestStore::new().await;
    store.stale_max_reads = 1;
    seed(&store, 5).await;
    let service = OficioService::new(store);

    let created = service.create(&form("A", "B", 2024)).await.expect("create");
    assert_eq!(created.numero, 6);
    assert_eq!(service.store().inserts.load(Ordering::SeqCst), 2);
    assert_eq!(service.store().max_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_conflicts_are_surfaced_after_bounded_attempts() {
    let mut store = TestStore::new().await;
    store.always_conflict = true;
    let service = OficioService::new(store);

    let err = service
        .create(&form("A", "B", 2024))
        .await
        .expect_err("conflict");
    assert!(matches!(err, OficioError::Remote(StoreError::Conflict(_))));
    assert_eq!(
        service.store().inserts.load(Ordering::SeqCst),
        MAX_NUMBER_ALLOCATION_ATTEMPTS
    );
}

#[tokio::test]
async fn concurrent_creates_receive_distinct_numbers() {
    let service = Arc::new(OficioService::new(TestStore::new().await));

    let creates = (0..4).map(|i| {
        let service = Arc::clone(&service);
        async move {
            service
                .create(&form(&format!("Remetente {i}"), "B", 2024))
                .await
        }
    });
    let results = futures::future::join_all(creates).await;

    let mut numeros: Vec<i64> = results
        .into_iter()
        .map(|result| result.expect("create").numero)
        .collect();
    numeros.sort_unstable();
    assert_eq!(numeros, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn update_changes_cidade_and_keeps_identity_and_numero() {
    let store = TestStore::new().await;
    let seeded = seed(&store, 3).await;
    let service = OficioService::new(store);

    let mut edit = OficioForm::from_oficio(&seeded);
    edit.cidade = "Nova Russas".into();
    edit.ano = Some(1999);
    service.update(seeded.id, &edit).await.expect("update");

    let fetched = service
        .get(seeded.id)
        .await
        .expect("fetch")
        .expect("still there");
    assert_eq!(fetched.cidade, "Nova Russas");
    assert_eq!(fetched.id, seeded.id);
    assert_eq!(fetched.numero, 3);
    assert_eq!(fetched.ano, 2023);
}

#[tokio::test]
async fn update_without_identity_is_rejected_before_sending() {
    let service = OficioService::new(TestStore::new().await);

    let err = service
        .update(OficioId(0), &form("A", "B", 2024))
        .await
        .expect_err("no identity");
    assert!(matches!(err, OficioError::Validation(_)));
    assert_eq!(service.store().writes(), 0);
}

#[tokio::test]
async fn update_of_unknown_identity_is_remote_not_found() {
    let service = OficioService::new(TestStore::new().await);

    let err = service
        .update(OficioId(77), &form("A", "B", 2024))
        .await
        .expect_err("unknown id");
    assert!(matches!(err, OficioError::Remote(StoreError::NotFound(_))));
}

#[tokio::test]
async fn function_flow_validates_before_invoking() {
    let store = TestStore::new().await;
    seed(&store, 10).await;
    let service = OficioService::new(store);

    let err = service
        .create_via_function(&form("A", "", 2024))
        .await
        .expect_err("validation");
    assert!(matches!(err, OficioError::Validation(_)));

    let created = service
        .create_via_function(&form("A", "B", 2024))
        .await
        .expect("function create")
        .expect("row echoed");
    assert_eq!(created.numero, 11);
}
