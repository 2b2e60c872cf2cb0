// Start of file: /src/api/middleware/mod.rs

pub mod admin;
pub mod audit;
pub mod threat;

// End of file: /src/api/middleware/mod.rs
