//! Ratewatch Store
//!
//! Durable, append-only storage of rate observations in PostgreSQL.

pub mod postgres;
pub mod row;

pub use postgres::PgRateStore;
pub use row::CurrencyRateRow;
