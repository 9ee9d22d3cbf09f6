pub mod history;
pub mod ledger;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod store;

pub use store::Store;
