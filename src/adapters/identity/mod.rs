//! Identity provider integration
//!
//! Users authenticate against a managed user pool. Roles are stored as pool
//! groups and mirrored on the stored [`User`](crate::domain::User) record.

pub mod memory;
pub mod traits;
pub mod user_pool;

pub use memory::MemoryIdentityProvider;
pub use traits::{AuthTokens, IdentityProvider, IdentityUser, NewIdentityUser};
pub use user_pool::{secret_hash, UserPoolClient};
