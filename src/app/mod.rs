pub mod backend;
pub mod errors;
pub mod factory;
pub mod remote;

pub use backend::SearchBackend;
pub use errors::SearchError;
pub use factory::AppFactory;
