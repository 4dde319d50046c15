//! Domain models shared between the ledgers and the REST API.

mod analysis;
mod group;
mod shared;
mod user;

pub use analysis::*;
pub use group::*;
pub use shared::*;
pub use user::*;
