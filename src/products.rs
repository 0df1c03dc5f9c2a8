use std::future::Future;
use std::path::Path;

use serde::Deserialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{FromRow, Row};

use crate::config::Config;
use crate::semantic::display_text;

/// Catalog query. Only `name` feeds the display text.
const SELECT_PRODUCTS: &str = "SELECT id, name FROM products";

/// A product as the search index sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: i64,
    pub text: String,
}

/// Raw catalog row, shared by the MySQL query and JSON catalog files.
#[derive(Debug, Deserialize)]
struct ProductRow {
    id: Option<RawId>,
    name: Option<String>,
}

/// Identifier as stored, before it is checked to fit an `i64`.
#[derive(Debug, Deserialize)]
#[serde(from = "JsonId")]
enum RawId {
    Signed(i64),
    Unsigned(u64),
    Invalid(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonId {
    Signed(i64),
    Unsigned(u64),
    Other(serde_json::Value),
}

impl From<JsonId> for RawId {
    fn from(id: JsonId) -> Self {
        match id {
            JsonId::Signed(id) => RawId::Signed(id),
            JsonId::Unsigned(id) => RawId::Unsigned(id),
            JsonId::Other(value) => RawId::Invalid(value.to_string()),
        }
    }
}

impl RawId {
    fn to_i64(&self) -> Result<i64, String> {
        match self {
            RawId::Signed(id) => Ok(*id),
            RawId::Unsigned(id) => {
                i64::try_from(*id).map_err(|_| format!("id {id} is out of range"))
            }
            RawId::Invalid(raw) => Err(format!("id {raw} is not an integer")),
        }
    }
}

impl<'r> FromRow<'r, MySqlRow> for ProductRow {
    fn from_row(row: &'r MySqlRow) -> Result<Self, sqlx::Error> {
        // the column type is not trusted, anything that isn't an integer is
        // kept as text and rejected later with its row number. Unsigned goes
        // first so a BIGINT UNSIGNED never wraps through i64.
        let id = match row.try_get::<Option<u64>, _>("id") {
            Ok(id) => id.map(RawId::Unsigned),
            Err(_) => match row.try_get::<Option<i64>, _>("id") {
                Ok(id) => id.map(RawId::Signed),
                Err(err) => Some(RawId::Invalid(
                    row.try_get::<Option<String>, _>("id")
                        .ok()
                        .flatten()
                        .map(|raw| format!("{raw:?}"))
                        .unwrap_or_else(|| format!("({err})")),
                )),
            },
        };

        Ok(Self {
            id,
            name: row.try_get("name")?,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DataSourceError {
    #[error("failed to connect to product store: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("product query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("malformed product row #{row}: {reason}")]
    Malformed { row: usize, reason: String },

    #[error("failed to read catalog file: {0}")]
    File(#[from] std::io::Error),

    #[error("catalog file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bulk, read-only access to the product catalog.
pub trait ProductSource: Send + Sync {
    /// Fetch every product in source order.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<ProductRecord>, DataSourceError>> + Send;
}

/// Catalog backed by the `products` table of a MySQL database.
#[derive(Clone)]
pub struct MySqlProductSource {
    pool: MySqlPool,
}

impl MySqlProductSource {
    pub async fn connect(config: &Config) -> Result<Self, DataSourceError> {
        let options = MySqlConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .username(&config.db_user)
            .password(&config.db_pass)
            .database(&config.db_name);

        // the catalog is read once, a single connection is enough
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(DataSourceError::Connect)?;

        log::debug!(
            "connected to mysql at {}:{}/{}",
            config.db_host,
            config.db_port,
            config.db_name
        );

        Ok(Self { pool })
    }
}

impl ProductSource for MySqlProductSource {
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>, DataSourceError> {
        let rows: Vec<ProductRow> = sqlx::query_as(SELECT_PRODUCTS)
            .fetch_all(&self.pool)
            .await?;

        records_from_rows(rows)
    }
}

fn records_from_rows(rows: Vec<ProductRow>) -> Result<Vec<ProductRecord>, DataSourceError> {
    rows.into_iter()
        .enumerate()
        .map(|(row, ProductRow { id, name })| {
            let id = id
                .ok_or_else(|| "id is NULL".to_string())
                .and_then(|id| id.to_i64())
                .map_err(|reason| DataSourceError::Malformed { row, reason })?;
            Ok(ProductRecord {
                id,
                text: display_text(name.as_deref()),
            })
        })
        .collect()
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone)]
pub struct StaticProductSource {
    records: Vec<ProductRecord>,
}

impl StaticProductSource {
    pub fn new(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }

    /// Load a catalog dump: a JSON array of `{"id": 1, "name": "..."}` rows,
    /// read with the same rules as the `products` table.
    pub fn from_json_file(path: &Path) -> Result<Self, DataSourceError> {
        let raw = std::fs::read(path)?;
        let rows: Vec<ProductRow> = serde_json::from_slice(&raw)?;
        let records = records_from_rows(rows)?;

        log::debug!("read {} products from {}", records.len(), path.display());

        Ok(Self::new(records))
    }
}

impl ProductSource for StaticProductSource {
    async fn fetch_all(&self) -> Result<Vec<ProductRecord>, DataSourceError> {
        Ok(self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_become_records_in_order() {
        let rows = vec![
            ProductRow {
                id: Some(RawId::Signed(3)),
                name: Some(" Steel Beam Support ".to_string()),
            },
            ProductRow {
                id: Some(RawId::Signed(1)),
                name: Some("Steel Pipe Clamp".to_string()),
            },
        ];

        let records = records_from_rows(rows).unwrap();
        assert_eq!(
            records,
            vec![
                ProductRecord {
                    id: 3,
                    text: "Steel Beam Support".to_string()
                },
                ProductRecord {
                    id: 1,
                    text: "Steel Pipe Clamp".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_null_name_becomes_empty_text() {
        let rows = vec![ProductRow {
            id: Some(RawId::Signed(9)),
            name: None,
        }];

        let records = records_from_rows(rows).unwrap();
        assert_eq!(records[0].text, "");
    }

    #[test]
    fn test_null_id_is_malformed() {
        let rows = vec![
            ProductRow {
                id: Some(RawId::Signed(1)),
                name: None,
            },
            ProductRow {
                id: None,
                name: Some("ghost".to_string()),
            },
        ];

        let result = records_from_rows(rows);
        assert!(matches!(result, Err(DataSourceError::Malformed { row: 1, .. })));
    }

    #[test]
    fn test_unsigned_id_within_range() {
        let rows = vec![ProductRow {
            id: Some(RawId::Unsigned(42)),
            name: Some("Steel Pipe Clamp".to_string()),
        }];

        let records = records_from_rows(rows).unwrap();
        assert_eq!(records[0].id, 42);
    }

    #[test]
    fn test_unsigned_id_out_of_range_is_malformed() {
        let rows = vec![
            ProductRow {
                id: Some(RawId::Signed(1)),
                name: None,
            },
            ProductRow {
                id: Some(RawId::Unsigned(u64::MAX)),
                name: Some("Steel Pipe Clamp".to_string()),
            },
        ];

        let result = records_from_rows(rows);
        assert!(matches!(result, Err(DataSourceError::Malformed { row: 1, .. })));
    }

    #[test]
    fn test_non_integer_id_is_malformed() {
        let rows = vec![ProductRow {
            id: Some(RawId::Invalid("\"abc\"".to_string())),
            name: Some("Steel Pipe Clamp".to_string()),
        }];

        match records_from_rows(rows) {
            Err(DataSourceError::Malformed { row, reason }) => {
                assert_eq!(row, 0);
                assert!(reason.contains("abc"));
            }
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_json_catalog_non_integer_ids_are_malformed() {
        for (n, body) in [
            r#"[{"id": "5", "name": "Steel Pipe Clamp"}]"#,
            r#"[{"id": 1.5, "name": "Steel Pipe Clamp"}]"#,
            r#"[{"id": 18446744073709551615, "name": "Steel Pipe Clamp"}]"#,
        ]
        .iter()
        .enumerate()
        {
            let path = std::env::temp_dir().join(format!(
                "product-search-catalog-id-{}-{n}.json",
                std::process::id()
            ));
            std::fs::write(&path, body).unwrap();

            let result = StaticProductSource::from_json_file(&path);
            let _ = std::fs::remove_file(&path);

            assert!(
                matches!(result, Err(DataSourceError::Malformed { row: 0, .. })),
                "{body}: {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_static_source_returns_records() {
        let records = vec![ProductRecord {
            id: 1,
            text: "Steel Pipe Clamp".to_string(),
        }];
        let source = StaticProductSource::new(records.clone());

        assert_eq!(source.fetch_all().await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_json_catalog_file() {
        let path = std::env::temp_dir().join(format!(
            "product-search-catalog-{}.json",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"[{"id": 2, "name": " Rubber Gasket Seal "}, {"id": 1, "name": null}, {"id": 5}]"#,
        )
        .unwrap();

        let source = StaticProductSource::from_json_file(&path).unwrap();
        let records = source.fetch_all().await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(
            records,
            vec![
                ProductRecord {
                    id: 2,
                    text: "Rubber Gasket Seal".to_string()
                },
                ProductRecord {
                    id: 1,
                    text: String::new()
                },
                ProductRecord {
                    id: 5,
                    text: String::new()
                },
            ]
        );
    }

    #[test]
    fn test_json_catalog_missing_id_is_malformed() {
        let path = std::env::temp_dir().join(format!(
            "product-search-catalog-bad-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"[{"name": "ghost"}]"#).unwrap();

        let result = StaticProductSource::from_json_file(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(DataSourceError::Malformed { row: 0, .. })));
    }

    #[test]
    fn test_json_catalog_missing_file() {
        let result = StaticProductSource::from_json_file(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(result, Err(DataSourceError::File(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running MySQL with a products table"]
    async fn test_mysql_fetch_all() {
        let config = Config::from_env().unwrap();
        let source = MySqlProductSource::connect(&config).await.unwrap();
        let records = source.fetch_all().await.unwrap();
        assert!(records.iter().all(|r| r.text.trim() == r.text));
    }
}
