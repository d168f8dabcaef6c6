pub mod constant;
pub mod deployment;
pub mod job;
pub mod manifest;
pub mod transfer;
