//! Embedded database migrations for Game Hangar.
//!
//! The SQL lives in `migrations/` at the crate root so the same files can be
//! pointed at with `PSQL_MIGRATE_ROOT_DIR`.

/// Database migrations, `(name, sql)`, applied in order starting at version 1.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("setup", include_str!("../../migrations/0001_setup.sql")),
    ("user", include_str!("../../migrations/0002_user.sql")),
    ("asset", include_str!("../../migrations/0003_asset.sql")),
    ("forum", include_str!("../../migrations/0004_forum.sql")),
    ("demo", include_str!("../../migrations/0005_demo.sql")),
    ("policy", include_str!("../../migrations/0006_policy.sql")),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert_eq!(MIGRATIONS.len(), 6);
        for (name, sql) in MIGRATIONS {
            assert!(!name.is_empty());
            assert!(!sql.trim().is_empty(), "migration {name} is empty");
        }
    }

    #[test]
    fn test_demo_topic_is_seeded() {
        let (_, forum) = MIGRATIONS[3];
        assert!(forum.contains("INSERT INTO forum.topics (id, name) VALUES (1, 'Demos')"));
    }
}
