pub mod client;

pub use client::{parse_instances, DirectoryClient};
