pub mod authz;
pub mod common;
pub mod invitation;
pub mod notify;
pub mod organization;
pub mod user;

pub use authz::{AccessScope, Action, PermissionTable, Resource, Role};
pub use user::{Principal, UserId};
