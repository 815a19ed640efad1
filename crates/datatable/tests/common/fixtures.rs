//! Seeded fixtures.
//!
//! The `posts` table holds 25 rows whose values are derived from the row id:
//!
//! | column         | value for row `i`                                        |
//! |----------------|----------------------------------------------------------|
//! | `title`        | `Post {i:02}`                                            |
//! | `nickname`     | `''` when `i % 7 == 0`, NULL when `i % 6 == 0`, else `nick{i}` |
//! | `score`        | NULL when `i % 5 == 0`, else `i`                         |
//! | `price_cents`  | `i * 100`                                                |
//! | `published`    | `i % 2 == 0`                                             |
//! | `published_on` | year `2020 + (i - 1) / 12`, month `(i - 1) % 12 + 1`, day `i % 28 + 1` |
//! | `created_at`   | `published_on` at 12:00:00                               |
//! | `owner_type`   | `User` when `i % 3 == 0`, else `Team`                    |
//! | `owner_id`     | `i % 4 + 1`                                              |
//! | `status`       | `open` for odd ids, `closed` for even ids                |
//!
//! Comments: (1, post 1, ann), (2, post 2, bob), (3, post 3, ann), (4, post 3, cy).
//! Tags: `rust` on posts 4 and 5, `sql` on post 5.

use helios_datatable::registry::ColumnRegistry;
use helios_datatable::types::{
    AssociationMode, AssociationOptions, ColumnOptions, ColumnType, NullOrdering, SearchOptions,
};

/// Number of seeded posts.
pub const POST_COUNT: u64 = 25;

/// Prefix the test deobfuscator strips from obfuscated ids.
pub const ID_PREFIX: &str = "p-";

/// Builds the `posts` schema and rows.
pub fn posts_sql() -> String {
    let mut sql = String::from(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY,
            title VARCHAR(100) NOT NULL,
            nickname VARCHAR(50),
            score INTEGER,
            price_cents INTEGER NOT NULL,
            published BOOLEAN NOT NULL,
            published_on DATE NOT NULL,
            created_at DATETIME NOT NULL,
            owner_type VARCHAR(20) NOT NULL,
            owner_id INTEGER NOT NULL,
            status VARCHAR(20) NOT NULL
        );
        CREATE TABLE comments (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL,
            author VARCHAR(50) NOT NULL,
            body TEXT
        );
        CREATE TABLE tags (
            id INTEGER PRIMARY KEY,
            name VARCHAR(50) NOT NULL
        );
        CREATE TABLE post_tags (
            post_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL
        );
        INSERT INTO comments VALUES (1, 1, 'ann', 'first');
        INSERT INTO comments VALUES (2, 2, 'bob', 'second');
        INSERT INTO comments VALUES (3, 3, 'ann', 'third');
        INSERT INTO comments VALUES (4, 3, 'cy', NULL);
        INSERT INTO tags VALUES (1, 'rust');
        INSERT INTO tags VALUES (2, 'sql');
        INSERT INTO post_tags VALUES (4, 1);
        INSERT INTO post_tags VALUES (5, 1);
        INSERT INTO post_tags VALUES (5, 2);
        ",
    );

    for i in 1..=POST_COUNT {
        let nickname = if i % 7 == 0 {
            "''".to_string()
        } else if i % 6 == 0 {
            "NULL".to_string()
        } else {
            format!("'nick{}'", i)
        };
        let score = if i % 5 == 0 {
            "NULL".to_string()
        } else {
            i.to_string()
        };
        let date = format!(
            "{}-{:02}-{:02}",
            2020 + (i - 1) / 12,
            (i - 1) % 12 + 1,
            i % 28 + 1
        );
        let owner_type = if i % 3 == 0 { "User" } else { "Team" };
        let status = if i % 2 == 0 { "closed" } else { "open" };

        sql.push_str(&format!(
            "INSERT INTO posts VALUES ({i}, 'Post {i:02}', {nickname}, {score}, {price}, {published}, '{date}', '{date} 12:00:00', '{owner_type}', {owner_id}, '{status}');\n",
            price = i * 100,
            published = u8::from(i % 2 == 0),
            owner_id = i % 4 + 1,
        ));
    }
    sql
}

/// The registry describing `posts`.
pub fn posts_registry() -> ColumnRegistry {
    ColumnRegistry::builder()
        .define("id", ColumnType::ObfuscatedId, ColumnOptions::new())
        .and_then(|b| b.define("title", ColumnType::String, ColumnOptions::new()))
        .and_then(|b| {
            b.define(
                "nickname",
                ColumnType::String,
                ColumnOptions::new().with_search(SearchOptions::exact()),
            )
        })
        .and_then(|b| {
            b.define(
                "score",
                ColumnType::Integer,
                ColumnOptions::new().with_null_ordering(NullOrdering::Last),
            )
        })
        .and_then(|b| {
            b.define(
                "price",
                ColumnType::Price,
                ColumnOptions::new().with_field("price_cents"),
            )
        })
        .and_then(|b| b.define("published", ColumnType::Boolean, ColumnOptions::new()))
        .and_then(|b| b.define("published_on", ColumnType::Date, ColumnOptions::new()))
        .and_then(|b| b.define("created_at", ColumnType::Datetime, ColumnOptions::new()))
        .and_then(|b| {
            b.define(
                "created_year",
                ColumnType::Year,
                ColumnOptions::new().with_field("created_at"),
            )
        })
        .and_then(|b| {
            b.define(
                "owner",
                ColumnType::PolymorphicAssociation,
                ColumnOptions::new().with_field("owner_id"),
            )
        })
        .and_then(|b| {
            b.define(
                "status",
                ColumnType::Enumeration,
                ColumnOptions::new().with_search(SearchOptions::exact()),
            )
        })
        .and_then(|b| b.define("comments", ColumnType::OneToMany, ColumnOptions::new()))
        .and_then(|b| {
            b.define(
                "comment_authors",
                ColumnType::OneToMany,
                ColumnOptions::new().with_association(AssociationOptions {
                    name: Some("comments".to_string()),
                    mode: AssociationMode::TextSearch {
                        field: Some("author".to_string()),
                    },
                }),
            )
        })
        .and_then(|b| {
            b.define(
                "tags",
                ColumnType::ManyToMany,
                ColumnOptions::new().with_association(AssociationOptions {
                    name: None,
                    mode: AssociationMode::TextSearch { field: None },
                }),
            )
        })
        .expect("posts registry is valid")
        .build()
}

/// Reverses the test obfuscation: `p-7` becomes `7`, anything else is returned unchanged.
pub fn deobfuscate(token: &str) -> String {
    token
        .strip_prefix(ID_PREFIX)
        .map(str::to_string)
        .unwrap_or_else(|| token.to_string())
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use helios_datatable::backends::sql::SqliteStore;
    use helios_datatable::core::{Association, JoinTable};

    use super::{deobfuscate, posts_sql};

    /// Creates an in-memory store seeded with the posts fixture.
    pub fn create_store() -> SqliteStore {
        let store = SqliteStore::in_memory()
            .expect("in-memory store")
            .with_association("posts", Association::has_many("comments", "comments", "post_id"))
            .with_association(
                "posts",
                Association::has_and_belongs_to_many(
                    "tags",
                    "tags",
                    JoinTable {
                        table: "post_tags".to_string(),
                        owner_key: "post_id".to_string(),
                        related_key: "tag_id".to_string(),
                    },
                ),
            )
            .with_deobfuscator(deobfuscate);
        store.execute_batch(&posts_sql()).expect("seed posts");
        store
    }
}

#[cfg(feature = "sqlite")]
pub use sqlite::create_store;
