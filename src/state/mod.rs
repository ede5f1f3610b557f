pub mod commands;
pub mod peer;
pub mod session;
