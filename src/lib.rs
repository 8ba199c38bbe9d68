// satchel: client-side caching and encrypted credential storage.
// An ephemeral TTL cache for remote fetch results, plus a durable store
// for OAuth provider tokens encrypted at rest.

pub mod cache;
pub mod error;
pub mod tokens;

pub use cache::{Cache, CacheRegistry, CacheStats, CleanupTask, spawn_cleanup};
pub use error::{Result, SatchelError};
pub use tokens::{Provider, StoredToken, TokenInfo, TokenSet, TokenStore};
