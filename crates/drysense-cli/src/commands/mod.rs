pub mod config;
pub mod history;
pub mod sensor;
pub mod session;
