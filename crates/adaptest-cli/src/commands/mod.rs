pub mod assess;
pub mod init;
pub mod override_cmd;
pub mod report;
pub mod simulate;
pub mod validate_pool;
