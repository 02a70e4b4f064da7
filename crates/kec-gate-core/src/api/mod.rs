//! Client for the KEC credential service.
//!
//! This module provides the `CredentialClient`, which performs the single
//! `POST /auth/login` exchange, and the `AuthError` taxonomy every login
//! failure is converted into. Raw transport errors never leave this module.

pub mod client;
pub mod error;

pub use client::CredentialClient;
pub use error::AuthError;
