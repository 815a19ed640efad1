//! Backend adapters.
//!
//! Each backend compiles the same column registry and search terms into its
//! own query model:
//!
//! | Backend | Query model | Store |
//! |---------|-------------|-------|
//! | [`sql`] | [`sql::Relation`] with bound parameters | any [`RecordStore`](crate::core::RecordStore) |
//! | [`search_index`] | Query DSL JSON | any [`SearchIndex`](crate::core::SearchIndex) |

pub mod search_index;
pub mod sql;
