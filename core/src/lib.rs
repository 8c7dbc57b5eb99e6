//! Core library for Vellum, a filesystem-backed Markdown vault for notes
//! and knowledge work.
//!
//! The [`vault`] module is the heart of the crate: the persistent document
//! and folder store, its reconciling directory scanner, and the integrity
//! checker. Higher layers (HTTP routes, chat features, UIs) are expected to
//! compose these primitives rather than touch the vault directory directly.

pub mod vault;

pub use vault::{Error, Result, Vault};
