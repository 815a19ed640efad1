//! Test infrastructure for the datatable adapters.
//!
//! Provides a seeded in-memory record store and the column registry that
//! describes it, shared by the relational and search index suites.

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
