//! Meme Store - encrypted, content-addressed object storage
//!
//! Objects are encrypted with a key derived from the server master key and a
//! per-object nonce ([`kdf`]), using chunked ChaCha20-Poly1305 ([`cipher`]),
//! before reaching whichever blob backend was selected at startup.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod kdf;
pub mod store;

pub use cipher::{StreamHeader, DEFAULT_CHUNK_SIZE, FORMAT_VERSION};
pub use kdf::derive_object_key;
pub use store::{EncryptedObjectStore, Ingested, ObjectStream, StoredObject};
