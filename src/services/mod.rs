pub mod audit;
pub mod bootstrap;
pub mod cloudflare;
pub mod permission_probe;
pub mod protected_zones;
pub mod security;
pub mod token_cipher;
pub mod token_resolver;
pub mod users;

pub use audit::{AuditEntry, AuditService};
pub use cloudflare::CloudflareClient;
pub use permission_probe::PermissionProber;
pub use protected_zones::ProtectedZoneGuard;
pub use security::SessionSigner;
pub use token_cipher::TokenCipher;
pub use token_resolver::{SessionUser, TokenResolver};
