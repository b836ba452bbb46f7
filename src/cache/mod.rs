//! Tile cache layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! └────────────────────┬────────────────────┘
//!                      │ TileCoord, Bytes
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TileCache                 │
//! │  key derivation · base64 · TTL · timeout│
//! └────────────────────┬────────────────────┘
//!                      │ key, text, ttl
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          CacheBackend Trait             │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  RedisBackend   │    │   MemoryBackend     │
//! │ (shared, remote)│    │ (in-process, LRU)   │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use road_tiles::cache::{MemoryBackend, TileCache};
//! use road_tiles::tile::TileCoord;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = TileCache::new(Arc::new(MemoryBackend::new()));
//!     let coord = TileCoord::new(10, 500, 500).unwrap();
//!
//!     cache.set(coord, &Bytes::from_static(&[0x1a, 0x03])).await.unwrap();
//!     let cached = cache.get(coord).await.unwrap();
//!     assert_eq!(cached, Some(Bytes::from_static(&[0x1a, 0x03])));
//! }
//! ```

mod backend;
mod memory;
mod redis_backend;
mod store;

pub use backend::CacheBackend;
pub use memory::{MemoryBackend, DEFAULT_MEMORY_CACHE_ENTRIES};
pub use redis_backend::RedisBackend;
pub use store::{TileCache, DEFAULT_CACHE_TIMEOUT, DEFAULT_CLEAR_TIMEOUT, TILE_CACHE_TTL};
