pub mod registry;
pub mod repository;
pub mod schema;
pub mod table;

pub use registry::{RegistryHandle, StoreRegistry};
pub use repository::LanceRepository;
