pub mod init;
pub mod list_providers;
pub mod run;
pub mod score;
pub mod validate;
