//! Authentication and session module

pub mod claims;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod refresh_store;

pub use claims::{Claims, PrincipalId, TokenKind};
pub use jwt::{IssuedToken, TokenIssuer, TokenPair, TokenValidator};
pub use middleware::{extract_token, jwt_auth_middleware, AuthContext};
pub use password::PasswordHasher;
pub use policy::SessionPolicy;
pub use refresh_store::{InMemoryRefreshStore, RefreshRecord, RefreshTokenStore};
