//! Database layer
//!
//! SQLite is the default backend; MySQL is selected through `database.driver`.
//! Repositories receive a [`DynDatabasePool`] and branch on [`Backend`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
