//! Query functions grouped by table.
//!
//! Every function takes a `&rusqlite::Connection` so callers can pass a
//! pooled connection or a `Transaction` (which derefs to one).

pub mod images;
pub mod references;
pub mod tags;
