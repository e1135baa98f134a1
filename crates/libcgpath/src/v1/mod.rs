pub mod cgroup_data;
pub mod controller_type;
pub mod mount;
pub mod path;
#[cfg(feature = "v1")]
pub mod resolver;
#[cfg(not(feature = "v1"))]
#[path = "../stub/v1/resolver.rs"]
pub mod resolver;

pub use controller_type::ControllerType;
