//! `warden-cas`: CAS 2.0 protocol client.
//!
//! Validates service and proxy tickets, collects proxy-granting tickets that
//! CAS delivered to the callback service, and requests proxy tickets for
//! downstream services.

pub mod authority;
pub mod client;
pub mod config;
pub mod error;
pub mod response;

pub use authority::CasAuthority;
pub use client::{CasClient, TicketKind};
pub use config::{CasConfig, RetrievalPolicy};
pub use error::CasError;
pub use response::{ProxyResponse, TicketValidation};
