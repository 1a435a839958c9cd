// ABOUTME: Library root for bosh-env - exposes the pipelines and their collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod agent;
pub mod blobstore;
pub mod cloud;
pub mod config;
pub mod cpi;
pub mod deployment;
pub mod env;
pub mod error;
pub mod installation;
pub mod manifest;
pub mod output;
pub mod release;
pub mod stage;
pub mod stemcell;
pub mod tarball;
pub mod types;
