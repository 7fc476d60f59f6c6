pub mod mutation;
pub mod registration;
