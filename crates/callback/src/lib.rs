//! `warden-callback`: the CAS proxy callback service.
//!
//! CAS delivers proxy-granting tickets out of band: it calls the application's
//! callback URL with a `(pgtIou, pgtId)` pair before answering the ticket
//! validation that carries the same `pgtIou`. This crate stores those pairs
//! durably and hands each PGT out exactly once.

pub mod app;
pub mod config;
pub mod purge;
pub mod store;
