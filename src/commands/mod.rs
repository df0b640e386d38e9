//! Command implementations for UPack CLI

pub mod archive;
pub mod bag;
pub mod compare;
pub mod completions;
pub mod helpers;
pub mod manifest;
pub mod run;
pub mod transfer;
pub mod verify_bag;
pub mod version;
