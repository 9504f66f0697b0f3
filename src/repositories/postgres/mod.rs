pub mod exchange;
pub mod permission;
pub mod roster;

pub use exchange::PgExchangeRepository;
pub use permission::{PgPermissionRepository, PgPermissionTypes};
pub use roster::PgRosterRepository;
