pub mod config;
pub mod enumber;
pub mod paperless;
pub mod search;
