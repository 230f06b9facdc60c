//! Message-passing front end for the analytics engine.
//!
//! A request is one JSON object `{action, id, data}`; every request yields
//! exactly one response carrying the same `id`. [`dispatch`] turns requests
//! into responses, [`worker`] fans them out over a pool of threads.

pub mod dispatch;
pub mod protocol;
pub mod worker;

pub use self::{
    dispatch::{handle, handle_line},
    protocol::{Operation, Request, Response, ResponseKind},
    worker::{ServeSummary, WorkerPool, serve_lines},
};
