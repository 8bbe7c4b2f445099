//!
//! Role-based access control for Snowflake
//!
//! Provisions access role hierarchies for databases, schemas and warehouses
//! and keeps functional roles in line with their configured rules.
#![deny(missing_docs)]

pub use catalog::{Catalog, CatalogSnapshot};
pub use config::ProvisionConfig;
pub use connection::fetch_credentials;
pub use write::Executor;

pub mod catalog;
pub mod config;
pub mod connection;
pub mod genconfig;
pub mod identifier;
pub mod logging;
pub mod naming;
pub mod project;
pub mod provision;
pub mod reconcile;
pub mod rules;
pub mod write;

#[macro_export]
/// Time the code inside the macro. Write the elapsed time to debug logs.
/// Derived from https://notes.iveselov.info/programming/time_it-a-case-study-in-rust-macros
macro_rules! log_runtime {
    ($context:literal, $($tt:tt)+) => {
        {
            debug!("{}: starting", $context);
            let timer = std::time::Instant::now();
            let x =
            $(
                $tt
            )+;
            debug!("{}: {:?}", $context, timer.elapsed());
            x
        }
    }
}
