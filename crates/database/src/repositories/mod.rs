pub mod invitation;
pub mod organization;
pub mod user;
pub mod utils;

pub use invitation::PgInvitationRepository;
pub use organization::PgOrganizationRepository;
pub use user::PgUserRepository;
