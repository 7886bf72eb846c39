pub mod admin;
pub mod manager;
pub mod shared;

pub use manager::Manager;
