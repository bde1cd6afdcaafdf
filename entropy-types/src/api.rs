//! Versioned API types.
//!
//! The API layer issues operator-signed commitments. Requests and responses are
//! grouped by version (see [`v1`]).

pub mod v1;
