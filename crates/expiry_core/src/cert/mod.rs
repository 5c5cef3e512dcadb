//! Certificate-signing adapter for an external HTTP PKI signer.
//!
//! Translates an internal X.509 signing request into the signer's JSON wire
//! shape and extracts the PEM certificate from its response. Transport is
//! owned by the caller.

pub mod signer;
