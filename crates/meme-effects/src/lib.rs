//! Meme Effects - effect handlers for the meme vault
//!
//! Concrete implementations of the interfaces declared in `meme-core`:
//! real and simulated clocks, OS and mock randomness, filesystem, in-memory
//! and object storage blob backends, and tracing initialisation. Handlers are chosen
//! once at startup and injected into components.

#![forbid(unsafe_code)]

pub mod logging;
pub mod random;
pub mod storage;
pub mod time;

pub use logging::init_tracing;
pub use random::{MockRandomHandler, OsRandomHandler};
pub use storage::{build_storage, FilesystemBlobStore, MemoryBlobStore, ObjectBlobStore};
pub use time::{SimulatedTimeHandler, SystemTimeHandler};
