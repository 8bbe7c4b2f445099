mod database;
mod grant;
mod role;
mod schema;
mod warehouse;

pub use database::Database;
pub use grant::Grant;
pub use role::Role;
pub use schema::Schema;
pub use warehouse::Warehouse;
