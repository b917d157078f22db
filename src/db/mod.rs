//! Database layer
//!
//! SQLite is the default backend; MySQL is available for larger
//! deployments. Repositories are written against the [`DatabasePool`]
//! trait and carry one SQL implementation per backend.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
