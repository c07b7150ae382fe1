pub mod config_cmd;
pub mod exec;
pub mod run;
mod runtime;
