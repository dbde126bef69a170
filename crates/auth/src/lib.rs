//! `warden-auth`: credential voting and the authorization model.
//!
//! This crate is intentionally decoupled from HTTP and storage. Backends plug
//! in through the [`Authority`] trait; [`Composite`] polls them in order.

pub mod authority;
pub mod automatic_access;
pub mod composite;
pub mod configuration;
pub mod credentials;
pub mod group;
pub mod static_authority;
pub mod user;

pub use authority::{Authority, AuthorityError, Capability, Validation};
pub use automatic_access::AutomaticAccessAuthority;
pub use composite::{AuthOutcome, Composite};
pub use configuration::Configuration;
pub use credentials::{CredentialKind, Credentials, Criterion};
pub use group::{Group, GroupMembership, GroupMemberships};
pub use static_authority::{StaticAuthority, UserBuilder};
pub use user::{Attribute, CasContext, User};
