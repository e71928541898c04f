use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::{NewOficio, Oficio, OficioChanges, OficioId},
    error::{StoreError, StoreResult},
    protocol::{OficioFilters, OficioPage, OficioQuery, SortDirection},
    store::OficioStore,
};

const OFICIO_COLUMNS: &str =
    "id, numero, ano, remetente, destinatario, cidade, utilizado, descricao, assunto, data_envio";

/// SQLite-backed ofícios table, used for offline work and as the store in tests.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own empty database.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Every row ordered by `numero`, for exports.
    pub async fn all_oficios(&self) -> Result<Vec<Oficio>> {
        let rows = sqlx::query(&format!(
            "SELECT {OFICIO_COLUMNS} FROM oficios ORDER BY numero ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to read oficios")?;
        rows.iter()
            .map(|row| oficio_from_row(row).context("malformed oficio row"))
            .collect()
    }

    /// Writes previously exported rows back with their original identities.
    /// All rows land or none do.
    pub async fn restore_oficios(&self, records: &[Oficio]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("failed to begin restore")?;
        for record in records {
            sqlx::query(
                "INSERT INTO oficios (id, numero, ano, remetente, destinatario, cidade, utilizado, descricao, assunto, data_envio)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.id.0)
            .bind(record.numero)
            .bind(record.ano)
            .bind(&record.remetente)
            .bind(&record.destinatario)
            .bind(&record.cidade)
            .bind(record.utilizado)
            .bind(record.descricao.as_deref())
            .bind(record.assunto.as_deref())
            .bind(record.data_envio.as_deref())
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "failed to restore oficio id={} numero={}",
                    record.id, record.numero
                )
            })?;
        }
        tx.commit().await.context("failed to commit restore")?;
        Ok(records.len())
    }
}

#[async_trait]
impl OficioStore for Storage {
    async fn fetch_page(&self, query: &OficioQuery) -> StoreResult<OficioPage> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM oficios");
        push_filters(&mut count, &query.filters);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {OFICIO_COLUMNS} FROM oficios"));
        push_filters(&mut select, &query.filters);
        select
            .push(" ORDER BY ")
            .push(query.sort.field.column())
            .push(match query.sort.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            })
            .push(", id ASC LIMIT ")
            .push_bind(i64::from(query.range.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.range.offset).unwrap_or(i64::MAX));

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        let records = rows
            .iter()
            .map(oficio_from_row)
            .collect::<sqlx::Result<Vec<_>>>()
            .map_err(store_error)?;

        debug!(
            rows = records.len(),
            total,
            offset = query.range.offset,
            "sqlite oficios page"
        );
        Ok(OficioPage {
            records,
            total_count: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn fetch_by_id(&self, id: OficioId) -> StoreResult<Option<Oficio>> {
        let row = sqlx::query(&format!("SELECT {OFICIO_COLUMNS} FROM oficios WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.as_ref()
            .map(oficio_from_row)
            .transpose()
            .map_err(store_error)
    }

    async fn max_numero(&self) -> StoreResult<Option<i64>> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(numero) FROM oficios")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn insert(&self, record: &NewOficio) -> StoreResult<Oficio> {
        let row = sqlx::query(&format!(
            "INSERT INTO oficios (numero, ano, remetente, destinatario, cidade, utilizado, descricao, assunto, data_envio)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {OFICIO_COLUMNS}"
        ))
        .bind(record.numero)
        .bind(record.ano)
        .bind(&record.remetente)
        .bind(&record.destinatario)
        .bind(record.cidade.as_str())
        .bind(record.utilizado)
        .bind(record.descricao.as_deref())
        .bind(record.assunto.as_deref())
        .bind(record.data_envio.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        oficio_from_row(&row).map_err(store_error)
    }

    async fn update(&self, id: OficioId, changes: &OficioChanges) -> StoreResult<Oficio> {
        let row = sqlx::query(&format!(
            "UPDATE oficios
             SET remetente = ?, destinatario = ?, cidade = ?, utilizado = ?, descricao = ?,
                 assunto = COALESCE(?, assunto), data_envio = COALESCE(?, data_envio)
             WHERE id = ?
             RETURNING {OFICIO_COLUMNS}"
        ))
        .bind(&changes.remetente)
        .bind(&changes.destinatario)
        .bind(changes.cidade.as_str())
        .bind(changes.utilizado)
        .bind(changes.descricao.as_deref())
        .bind(changes.assunto.as_deref())
        .bind(changes.data_envio.as_deref())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .ok_or_else(|| StoreError::NotFound(format!("oficio {id}")))?;
        oficio_from_row(&row).map_err(store_error)
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &OficioFilters) {
    builder.push(" WHERE 1 = 1");
    if let Some(year) = filters.year {
        builder.push(" AND ano = ").push_bind(year);
    }
    if let Some(is_used) = filters.is_used {
        builder.push(" AND utilizado = ").push_bind(is_used);
    }
    if let Some(term) = filters.search_term() {
        let pattern = like_pattern(term);
        builder
            .push(" AND (lower(remetente) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR lower(destinatario) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR lower(cidade) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

/// `%term%` with LIKE metacharacters escaped. SQLite's `lower` only folds
/// ASCII, so accented capitals in stored rows match only their exact case.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn oficio_from_row(row: &SqliteRow) -> sqlx::Result<Oficio> {
    Ok(Oficio {
        id: OficioId(row.try_get("id")?),
        numero: row.try_get("numero")?,
        ano: row.try_get("ano")?,
        remetente: row.try_get("remetente")?,
        destinatario: row.try_get("destinatario")?,
        cidade: row.try_get("cidade")?,
        utilizado: row.try_get("utilizado")?,
        descricao: row.try_get("descricao")?,
        assunto: row.try_get("assunto")?,
        data_envio: row.try_get("data_envio")?,
    })
}

fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
