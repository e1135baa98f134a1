//! Resolution of container cgroup v1 paths.
//! Computes, for every controller hierarchy, the directory below the controller's mount
//! point that belongs to a container, and guarantees that configuration supplied paths
//! can never escape that mount point.
#[cfg(test)]
#[macro_use]
extern crate quickcheck;

#[cfg(test)]
#[macro_use]
extern crate mockall;


pub mod common;
pub mod config;
pub mod utils;
pub mod v1;
pub mod v2;
