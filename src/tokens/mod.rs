// Encrypted storage for OAuth provider credentials.
// Tokens survive restarts; secrets only ever touch disk encrypted.

pub mod crypto;
pub mod paths;
pub mod provider;
pub mod store;

pub use crypto::MasterKey;
pub use provider::Provider;
pub use store::{StoredToken, TokenInfo, TokenSet, TokenStore};
