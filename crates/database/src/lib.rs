pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{PgInvitationRepository, PgOrganizationRepository, PgUserRepository};
