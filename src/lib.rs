pub mod cli;
pub mod clock;
pub mod config;
pub mod index;
pub mod source;
pub mod worker;
