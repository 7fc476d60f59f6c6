pub mod layout;
pub mod atomic;
pub mod file_lock;
pub mod manifest;
