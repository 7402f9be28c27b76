use sqlx::postgres::PgPool;

/// Schema steps in apply order. Each is a single statement and safe to re-run.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_create_documents",
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            data JSONB NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            PRIMARY KEY (collection, id)
        )
        "#,
    ),
    (
        "002_documents_data_gin",
        "CREATE INDEX IF NOT EXISTS documents_data_gin ON documents USING GIN (data)",
    ),
    (
        "003_documents_created_at",
        "CREATE INDEX IF NOT EXISTS documents_collection_created ON documents (collection, created_at)",
    ),
];

/// Apply every migration not yet recorded in the tracker table
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    init_migrations_tracker(pool).await?;

    for (name, sql) in MIGRATIONS {
        if is_applied(pool, name).await? {
            continue;
        }
        tracing::info!(migration = name, "running migration");
        sqlx::query(sql).execute(pool).await?;
        record_migration(pool, name).await?;
    }

    tracing::info!("database schema up to date");
    Ok(())
}

async fn init_migrations_tracker(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn is_applied(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar("SELECT id FROM migrations WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

async fn record_migration(pool: &PgPool, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO migrations (name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn migration_names_are_unique_and_ordered() {
        let names: Vec<&str> = MIGRATIONS.iter().map(|(name, _)| *name).collect();
        let unique: HashSet<&&str> = names.iter().collect();
        assert_eq!(unique.len(), names.len());

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
    }

    #[test]
    fn migrations_are_single_statements() {
        for (name, sql) in MIGRATIONS {
            assert!(!sql.trim().trim_end_matches(';').contains(';'), "{name}");
        }
    }
}
