pub mod repository;
pub mod schema;
pub mod store;

pub use repository::ProfileRepository;
pub use store::{Store, StoreOptions};
