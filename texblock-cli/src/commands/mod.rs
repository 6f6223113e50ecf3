//! CLI commands.

pub mod common;
pub mod config;
pub mod decode;
pub mod encode;
pub mod info;
pub mod init;
