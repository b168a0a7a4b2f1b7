//! Database module - SQLite/PostgreSQL connection and migrations

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row};

use crate::models::plant::SEED_PLANTS;

/// SQL dialect behind an `AnyPool`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("sqlite:") {
            Some(Backend::Sqlite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Some(Backend::Postgres)
        } else {
            None
        }
    }

    fn schema(self) -> &'static [&'static str] {
        match self {
            Backend::Sqlite => SQLITE_SCHEMA,
            Backend::Postgres => POSTGRES_SCHEMA,
        }
    }
}

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<AnyPool, sqlx::Error> {
    sqlx::any::install_default_drivers();

    let backend = Backend::from_url(database_url).ok_or_else(|| {
        sqlx::Error::Configuration(format!("unsupported database url scheme: {}", database_url).into())
    })?;

    let mut options = AnyPoolOptions::new();

    // Every in-memory SQLite connection is its own database
    if backend == Backend::Sqlite && database_url.contains(":memory:") {
        options = options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        options = options.max_connections(max_connections.max(1));
    }

    options.connect(database_url).await
}

/// Run database migrations
pub async fn run_migrations(pool: &AnyPool, backend: Backend) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let legacy = if backend == Backend::Sqlite {
        stash_legacy_tables(&mut *tx).await?
    } else {
        Vec::new()
    };

    for statement in backend.schema() {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    if !legacy.is_empty() {
        for (table, old_columns) in &legacy {
            let copied = sqlx::query(&table.copy_statement(old_columns))
                .execute(&mut *tx)
                .await?
                .rows_affected();
            sqlx::query(&format!("DROP TABLE {}_legacy", table.name))
                .execute(&mut *tx)
                .await?;
            tracing::info!("Upgraded legacy table {} ({} rows)", table.name, copied);
        }

        // Indexes that were attached to the old tables went with them
        for statement in backend.schema() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
    }

    tx.commit().await?;

    tracing::info!("Database schema applied successfully ({:?})", backend);
    Ok(())
}

/// How a column of an older table is carried into the current schema
#[derive(Debug, Clone, Copy)]
enum Carry {
    /// Copied as is, NULL when the old table lacks it
    Plain,
    /// NOT NULL now; NULL or missing becomes the given SQL literal
    Required(&'static str),
    /// NOT NULL RFC 3339 text now; old DATETIME values are normalised
    Timestamp,
}

#[derive(Debug)]
struct UpgradableTable {
    name: &'static str,
    columns: &'static [(&'static str, Carry)],
}

/// Tables written by earlier LeafSense backends (DATETIME columns, nullable
/// `user_id`, `status` and `hidden_from_user`)
const UPGRADABLE_TABLES: &[UpgradableTable] = &[
    UpgradableTable {
        name: "feedback",
        columns: &[
            ("id", Carry::Plain),
            ("user_id", Carry::Required("''")),
            ("message", Carry::Required("''")),
            ("timestamp", Carry::Timestamp),
        ],
    },
    UpgradableTable {
        name: "predictions",
        columns: &[
            ("id", Carry::Plain),
            ("user_id", Carry::Required("''")),
            ("image_url", Carry::Plain),
            ("prediction_result", Carry::Required("''")),
            ("confidence", Carry::Required("0.0")),
            ("timestamp", Carry::Timestamp),
        ],
    },
    UpgradableTable {
        name: "appointments",
        columns: &[
            ("id", Carry::Plain),
            ("user_id", Carry::Required("''")),
            ("name", Carry::Required("''")),
            ("email", Carry::Required("''")),
            ("date", Carry::Required("''")),
            ("time", Carry::Plain),
            ("doctor", Carry::Plain),
            ("reason", Carry::Required("''")),
            ("status", Carry::Required("'pending'")),
            ("meet_link", Carry::Plain),
            ("hidden_from_user", Carry::Required("0")),
            ("timestamp", Carry::Timestamp),
        ],
    },
    UpgradableTable {
        name: "user_profiles",
        columns: &[
            ("id", Carry::Plain),
            ("user_id", Carry::Required("''")),
            ("name", Carry::Plain),
            ("email", Carry::Plain),
            ("phone", Carry::Plain),
            ("state", Carry::Plain),
            ("profile_image_url", Carry::Plain),
            ("created_at", Carry::Timestamp),
            ("updated_at", Carry::Timestamp),
        ],
    },
    UpgradableTable {
        name: "plant_info",
        columns: &[
            ("id", Carry::Plain),
            ("plant_name", Carry::Required("''")),
            ("medicinal_values", Carry::Plain),
            ("preparations", Carry::Plain),
            ("dosage_guidance", Carry::Plain),
            ("created_at", Carry::Timestamp),
        ],
    },
];

/// One row of `pragma_table_info`
#[derive(Debug, Clone)]
struct ExistingColumn {
    name: String,
    declared_type: String,
    not_null: bool,
}

impl UpgradableTable {
    /// The `Any` driver only decodes INTEGER, REAL and TEXT declarations, and
    /// the models expect the NOT NULL columns to hold values
    fn needs_upgrade(&self, existing: &[ExistingColumn]) -> bool {
        let odd_type = existing.iter().any(|c| {
            !matches!(c.declared_type.to_ascii_uppercase().as_str(), "INTEGER" | "TEXT" | "REAL")
        });
        let loose_column = self.columns.iter().any(|(name, carry)| {
            !matches!(carry, Carry::Plain)
                && !existing.iter().any(|c| c.name == *name && c.not_null)
        });
        odd_type || loose_column
    }

    fn copy_statement(&self, existing: &[ExistingColumn]) -> String {
        let has = |name: &str| existing.iter().any(|c| c.name == name);

        let targets: Vec<&str> = self.columns.iter().map(|(name, _)| *name).collect();
        let sources: Vec<String> = self
            .columns
            .iter()
            .map(|(name, carry)| match (carry, has(name)) {
                (Carry::Plain, true) => name.to_string(),
                (Carry::Plain, false) => "NULL".to_string(),
                (Carry::Required(default), true) => format!("COALESCE({}, {})", name, default),
                (Carry::Required(default), false) => default.to_string(),
                (Carry::Timestamp, true) => format!("COALESCE({}, {})", rfc3339_expr(name), rfc3339_expr("'now'")),
                (Carry::Timestamp, false) => rfc3339_expr("'now'"),
            })
            .collect();

        format!(
            "INSERT INTO {table} ({targets}) SELECT {sources} FROM {table}_legacy ORDER BY id",
            table = self.name,
            targets = targets.join(", "),
            sources = sources.join(", "),
        )
    }
}

/// SQLite expression rewriting a date/time value as `YYYY-MM-DDTHH:MM:SS.ffffffZ`
/// (NULL when it cannot be parsed)
fn rfc3339_expr(value: &str) -> String {
    format!(
        "(strftime('%Y-%m-%dT%H:%M:%S', {v}) || '.' || substr(strftime('%f', {v}), 4, 3) || '000Z')",
        v = value
    )
}

async fn existing_columns(
    conn: &mut sqlx::AnyConnection,
    table: &str,
) -> Result<Vec<ExistingColumn>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT name, type AS declared_type, \"notnull\" AS not_null FROM pragma_table_info('{}')",
        table
    ))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ExistingColumn {
                name: row.try_get("name")?,
                declared_type: row.try_get("declared_type")?,
                not_null: row.try_get::<i64, _>("not_null")? != 0,
            })
        })
        .collect()
}

/// Move tables created by earlier backends out of the way as `<name>_legacy`
/// so the current schema can be created next to them
async fn stash_legacy_tables(
    conn: &mut sqlx::AnyConnection,
) -> Result<Vec<(&'static UpgradableTable, Vec<ExistingColumn>)>, sqlx::Error> {
    let mut stashed = Vec::new();

    for table in UPGRADABLE_TABLES {
        let existing = existing_columns(conn, table.name).await?;
        if existing.is_empty() || !table.needs_upgrade(&existing) {
            continue;
        }

        tracing::info!("Table {} uses an older layout, rebuilding", table.name);
        sqlx::query(&format!("ALTER TABLE {0} RENAME TO {0}_legacy", table.name))
            .execute(&mut *conn)
            .await?;
        stashed.push((table, existing));
    }

    Ok(stashed)
}

/// Insert the bundled plant information (existing rows are kept)
pub async fn seed_plant_info(pool: &AnyPool) -> Result<u64, sqlx::Error> {
    let created_at = crate::models::now_timestamp();
    let mut inserted = 0;

    for plant in SEED_PLANTS {
        let result = sqlx::query(
            r#"
            INSERT INTO plant_info (plant_name, medicinal_values, preparations, dosage_guidance, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (plant_name) DO NOTHING
            "#
        )
        .bind(plant.name)
        .bind(plant.medicinal_values)
        .bind(plant.preparations)
        .bind(plant.full_dosage_guidance())
        .bind(&created_at)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    if inserted > 0 {
        tracing::info!("Seeded {} plant information records", inserted);
    }
    Ok(inserted)
}

/// Tables the operator CLI may inspect or clear
pub const USER_TABLES: &[&str] = &["user_profiles", "appointments", "feedback", "predictions"];

/// Every row of a table as JSON objects, column order preserved
pub async fn dump_table(pool: &AnyPool, table: &str) -> Result<Vec<serde_json::Value>, sqlx::Error> {
    if !USER_TABLES.contains(&table) && table != "plant_info" {
        return Err(sqlx::Error::Protocol(format!("unknown table: {}", table)));
    }

    let rows = sqlx::query(&format!("SELECT * FROM {} ORDER BY id", table))
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(row_to_json).collect())
}

/// Delete all rows of one table
pub async fn clear_table(pool: &AnyPool, table: &str) -> Result<u64, sqlx::Error> {
    if !USER_TABLES.contains(&table) {
        return Err(sqlx::Error::Protocol(format!("refusing to clear table: {}", table)));
    }

    let result = sqlx::query(&format!("DELETE FROM {}", table))
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn row_to_json(row: &AnyRow) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            v.map(serde_json::Value::from)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            v.map(serde_json::Value::from)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            v.map(serde_json::Value::from)
        } else {
            None
        };
        object.insert(column.name().to_string(), value.unwrap_or(serde_json::Value::Null));
    }
    serde_json::Value::Object(object)
}

/// SQLite schema
const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        image_url TEXT,
        prediction_result TEXT NOT NULL,
        confidence REAL NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        date TEXT NOT NULL,
        time TEXT,
        doctor TEXT,
        reason TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        meet_link TEXT,
        hidden_from_user INTEGER NOT NULL DEFAULT 0,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT UNIQUE NOT NULL,
        name TEXT,
        email TEXT,
        phone TEXT,
        state TEXT,
        profile_image_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plant_info (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plant_name TEXT UNIQUE NOT NULL,
        medicinal_values TEXT,
        preparations TEXT,
        dosage_guidance TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feedback_user ON feedback(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_predictions_user ON predictions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_user ON appointments(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status)",
];

/// PostgreSQL schema
const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id BIGSERIAL PRIMARY KEY,
        user_id TEXT NOT NULL,
        message TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS predictions (
        id BIGSERIAL PRIMARY KEY,
        user_id TEXT NOT NULL,
        image_url TEXT,
        prediction_result TEXT NOT NULL,
        confidence DOUBLE PRECISION NOT NULL,
        timestamp TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id BIGSERIAL PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        date TEXT NOT NULL,
        time TEXT,
        doctor TEXT,
        reason TEXT NOT NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        meet_link TEXT,
        hidden_from_user BIGINT NOT NULL DEFAULT 0,
        timestamp TEXT NOT NULL
    )
    "#,
    "ALTER TABLE appointments ADD COLUMN IF NOT EXISTS hidden_from_user BIGINT NOT NULL DEFAULT 0",
    r#"
    CREATE TABLE IF NOT EXISTS user_profiles (
        id BIGSERIAL PRIMARY KEY,
        user_id TEXT UNIQUE NOT NULL,
        name TEXT,
        email TEXT,
        phone TEXT,
        state TEXT,
        profile_image_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plant_info (
        id BIGSERIAL PRIMARY KEY,
        plant_name TEXT UNIQUE NOT NULL,
        medicinal_values TEXT,
        preparations TEXT,
        dosage_guidance TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feedback_user ON feedback(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_predictions_user ON predictions(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_user ON appointments(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments(status)",
];
