//! Dacpac Deployer Library
//!
//! Deploys built schema packages onto the database resources they are linked
//! to, once the host has created every resource of an application topology.

pub mod artifact;
pub mod config;
pub mod deploy;
pub mod error;
pub mod hook;
pub mod metadata;
pub mod package;
pub mod topology;
