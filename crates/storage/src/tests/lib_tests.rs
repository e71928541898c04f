use super::*;
use shared::{
    domain::Cidade,
    protocol::{PageRange, SortField, SortSpec},
};

fn new_oficio(numero: i64, ano: i32, remetente: &str, destinatario: &str, cidade: Cidade) -> NewOficio {
    NewOficio {
        numero,
        ano,
        remetente: remetente.to_string(),
        destinatario: destinatario.to_string(),
        cidade,
        utilizado: false,
        descricao: None,
        assunto: None,
        data_envio: None,
    }
}

fn query(filters: OficioFilters, sort: SortSpec, page: u32, page_size: u32) -> OficioQuery {
    OficioQuery {
        filters,
        sort,
        range: PageRange::for_page(page, page_size),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("oficios.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn max_numero_is_none_for_empty_table() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.max_numero().await.expect("max"), None);

    storage
        .insert(&new_oficio(4, 2024, "A", "B", Cidade::Crateus))
        .await
        .expect("insert");
    storage
        .insert(&new_oficio(9, 2023, "A", "B", Cidade::Crateus))
        .await
        .expect("insert");
    assert_eq!(storage.max_numero().await.expect("max"), Some(9));
}

#[tokio::test]
async fn duplicate_numero_is_a_conflict() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert(&new_oficio(1, 2024, "A", "B", Cidade::Crateus))
        .await
        .expect("first insert");

    let err = storage
        .insert(&new_oficio(1, 2025, "C", "D", Cidade::Ipueiras))
        .await
        .expect_err("duplicate numero must fail");
    assert!(err.is_conflict(), "unexpected error: {err}");
}

#[tokio::test]
async fn search_matches_any_text_column_case_insensitively() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert(&new_oficio(1, 2024, "Maria Souza", "Prefeitura", Cidade::Crateus))
        .await
        .expect("insert");
    storage
        .insert(&new_oficio(2, 2024, "Secretaria", "MARIANA Lima", Cidade::Crateus))
        .await
        .expect("insert");
    storage
        .insert(&new_oficio(3, 2024, "João", "Câmara", Cidade::NovaRussas))
        .await
        .expect("insert");

    let filters = OficioFilters {
        search: Some("maria".into()),
        ..OficioFilters::default()
    };
    let page = storage
        .fetch_page(&query(filters, SortSpec::default(), 1, 10))
        .await
        .expect("page");
    assert_eq!(page.total_count, 2);
    let numeros: Vec<i64> = page.records.iter().map(|r| r.numero).collect();
    assert_eq!(numeros, vec![2, 1]);

    let by_city = OficioFilters {
        search: Some("russas".into()),
        ..OficioFilters::default()
    };
    let page = storage
        .fetch_page(&query(by_city, SortSpec::default(), 1, 10))
        .await
        .expect("page");
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].numero, 3);
}

#[tokio::test]
async fn like_metacharacters_in_search_are_literal() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert(&new_oficio(1, 2024, "100% Saúde", "B", Cidade::Crateus))
        .await
        .expect("insert");
    storage
        .insert(&new_oficio(2, 2024, "1000 Saúde", "B", Cidade::Crateus))
        .await
        .expect("insert");

    let filters = OficioFilters {
        search: Some("100%".into()),
        ..OficioFilters::default()
    };
    let page = storage
        .fetch_page(&query(filters, SortSpec::default(), 1, 10))
        .await
        .expect("page");
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].numero, 1);
}

#[tokio::test]
async fn year_and_usage_filters_combine() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut used = new_oficio(1, 2023, "A", "B", Cidade::Crateus);
    used.utilizado = true;
    storage.insert(&used).await.expect("insert");
    storage
        .insert(&new_oficio(2, 2023, "A", "B", Cidade::Crateus))
        .await
        .expect("insert");
    let mut other_year = new_oficio(3, 2024, "A", "B", Cidade::Crateus);
    other_year.utilizado = true;
    storage.insert(&other_year).await.expect("insert");

    let filters = OficioFilters {
        year: Some(2023),
        is_used: Some(true),
        ..OficioFilters::default()
    };
    let page = storage
        .fetch_page(&query(filters, SortSpec::default(), 1, 10))
        .await
        .expect("page");
    assert_eq!(page.total_count, 1);
    assert_eq!(page.records[0].numero, 1);
    assert!(page.records[0].utilizado);
}

#[tokio::test]
async fn pages_follow_sort_and_offset() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    for (numero, remetente) in [(1, "Carla"), (2, "Ana"), (3, "Bruno"), (4, "Diego"), (5, "Eva")] {
        storage
            .insert(&new_oficio(numero, 2024, remetente, "X", Cidade::Crateus))
            .await
            .expect("insert");
    }

    let sort = SortSpec::new(SortField::Remetente, SortDirection::Asc);
    let first = storage
        .fetch_page(&query(OficioFilters::default(), sort, 1, 2))
        .await
        .expect("page 1");
    let second = storage
        .fetch_page(&query(OficioFilters::default(), sort, 2, 2))
        .await
        .expect("page 2");
    let third = storage
        .fetch_page(&query(OficioFilters::default(), sort, 3, 2))
        .await
        .expect("page 3");
    let past_end = storage
        .fetch_page(&query(OficioFilters::default(), sort, 4, 2))
        .await
        .expect("page 4");

    let names = |page: &OficioPage| -> Vec<String> {
        page.records.iter().map(|r| r.remetente.clone()).collect()
    };
    assert_eq!(names(&first), vec!["Ana", "Bruno"]);
    assert_eq!(names(&second), vec!["Carla", "Diego"]);
    assert_eq!(names(&third), vec!["Eva"]);
    assert!(past_end.records.is_empty());
    assert_eq!(past_end.total_count, 5);
}

#[tokio::test]
async fn update_keeps_numero_and_ano() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let created = storage
        .insert(&new_oficio(7, 2022, "A", "B", Cidade::Crateus))
        .await
        .expect("insert");

    let updated = storage
        .update(
            created.id,
            &OficioChanges {
                remetente: "A2".into(),
                destinatario: "B2".into(),
                cidade: Cidade::Ipueiras,
                utilizado: true,
                descricao: Some("arquivado".into()),
                assunto: None,
                data_envio: Some("2022-03-01".into()),
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.numero, 7);
    assert_eq!(updated.ano, 2022);
    assert_eq!(updated.cidade, "Ipueiras");
    assert_eq!(updated.descricao.as_deref(), Some("arquivado"));

    let fetched = storage
        .fetch_by_id(created.id)
        .await
        .expect("fetch")
        .expect("row exists");
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn update_leaves_unset_subject_and_send_date_alone() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut record = new_oficio(4, 2024, "A", "B", Cidade::Crateus);
    record.assunto = Some("Convite".into());
    record.data_envio = Some("2024-02-10".into());
    record.descricao = Some("rascunho".into());
    let created = storage.insert(&record).await.expect("insert");

    let updated = storage
        .update(
            created.id,
            &OficioChanges {
                remetente: "A".into(),
                destinatario: "B".into(),
                cidade: Cidade::NovaRussas,
                utilizado: false,
                descricao: None,
                assunto: None,
                data_envio: None,
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.assunto.as_deref(), Some("Convite"));
    assert_eq!(updated.data_envio.as_deref(), Some("2024-02-10"));
    assert_eq!(updated.descricao, None);
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let err = storage
        .update(
            OficioId(404),
            &OficioChanges {
                remetente: "A".into(),
                destinatario: "B".into(),
                cidade: Cidade::Crateus,
                utilizado: false,
                descricao: None,
                assunto: None,
                data_envio: None,
            },
        )
        .await
        .expect_err("missing row");
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn restore_round_trips_exported_rows() {
    let source = Storage::new("sqlite::memory:").await.expect("source db");
    source
        .insert(&new_oficio(3, 2024, "A", "B", Cidade::Crateus))
        .await
        .expect("insert");
    source
        .insert(&new_oficio(1, 2023, "C", "D", Cidade::NovaRussas))
        .await
        .expect("insert");
    let exported = source.all_oficios().await.expect("export");
    assert_eq!(
        exported.iter().map(|r| r.numero).collect::<Vec<_>>(),
        vec![1, 3]
    );

    let target = Storage::new("sqlite::memory:").await.expect("target db");
    assert_eq!(target.restore_oficios(&exported).await.expect("restore"), 2);
    assert_eq!(target.all_oficios().await.expect("reexport"), exported);
}

#[tokio::test]
async fn restore_with_duplicate_numero_writes_nothing() {
    let source = Storage::new("sqlite::memory:").await.expect("source db");
    let first = source
        .insert(&new_oficio(1, 2024, "A", "B", Cidade::Crateus))
        .await
        .expect("insert");
    let mut clash = first.clone();
    clash.id = OficioId(first.id.0 + 1);

    let target = Storage::new("sqlite::memory:").await.expect("target db");
    target
        .restore_oficios(&[first, clash])
        .await
        .expect_err("duplicate numero");
    assert!(target.all_oficios().await.expect("read back").is_empty());
    assert_eq!(target.max_numero().await.expect("max"), None);
}

#[test]
fn like_pattern_escapes_metacharacters() {
    assert_eq!(like_pattern("Ab_c%"), "%ab\\_c\\%%");
}
