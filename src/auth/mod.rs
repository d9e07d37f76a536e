pub mod claims;
pub mod dto;
pub mod identity;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod services;

pub use dto::{AuthResponse, ExternalAuthRequest, LoginRequest, PublicUser, RegisterRequest};
pub use identity::{IdentityClaims, IdentityVerifier};
pub use jwt::{bearer_token, JwtKeys};
pub use policy::{require_ownership, require_role, AuthContext};
pub use services::AuthService;
