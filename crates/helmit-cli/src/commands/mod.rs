//! CLI command implementations

pub mod init_test_env;
pub mod show;
pub mod test;
