//! Concrete storage pieces: a durable file backend, per-backend fingerprints,
//! and the key hashing / value encryption used when obfuscation is enabled.

pub mod cipher;
pub mod file_backend;
pub mod fingerprint;
