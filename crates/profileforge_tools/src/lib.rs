#![forbid(unsafe_code)]

pub mod shell;
