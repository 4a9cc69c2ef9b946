pub mod client;
pub mod config;
pub mod error;
pub mod importer;
pub mod linker;
pub mod rows;
pub mod updater;
