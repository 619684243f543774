//! Persistence layer
//!
//! sqlx-backed repositories. Each store takes an explicit `PgPool` handle;
//! there is no process-wide connection state.

pub mod bills;
pub mod guests;
pub mod passwords;
pub mod users;

pub use bills::BillStore;
pub use guests::GuestStore;
pub use passwords::PasswordStore;
pub use users::UserStore;
