#![forbid(unsafe_code)]

pub mod credential;
pub mod session_marker;
