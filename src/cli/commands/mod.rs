//! CLI command implementations

pub mod cache;
pub mod config;
pub mod list;
pub mod status;
pub mod submit;
pub mod worker;

pub use cache::execute as cache;
pub use config::execute as config;
pub use list::execute as list;
pub use status::execute as status;
pub use submit::execute as submit;
pub use worker::execute as worker;
