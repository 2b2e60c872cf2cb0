// Start of file: /src/utils/mod.rs

/*
    * Utility modules: global error handling, the response envelope,
    * request metadata capture and shared JSON helpers.
*/

pub mod error_handler;
pub mod request_meta;
pub mod response_handler;
pub mod utils;

// End of file: /src/utils/mod.rs
