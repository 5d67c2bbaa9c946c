// Discovery Module
// Discovery services and the registry that runs their scans

pub mod registry;
pub mod service;

pub use registry::*;
pub use service::*;
