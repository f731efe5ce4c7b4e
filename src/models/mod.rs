pub mod audit_log;
pub mod cf_account;
pub mod user;
pub mod user_cf_account;
pub mod webhook;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::audit_log::{self, Entity as AuditLog};
    pub use super::cf_account::{self, Entity as CfAccount};
    pub use super::user::{self, Entity as User, Role};
    pub use super::user_cf_account::{self, Entity as UserCfAccount};
    pub use super::webhook::{self, Entity as Webhook};
}
