//! Embedded SQL migrations

/// Migration metadata
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All embedded migrations in apply order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            id: "001_entities",
            sql: include_str!("../../migrations/001_entities.sql"),
        },
        Migration {
            id: "002_association_links",
            sql: include_str!("../../migrations/002_association_links.sql"),
        },
    ]
}
