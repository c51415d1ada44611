pub mod control;
pub mod notify;
pub mod services;
