// Handler modules
pub mod scan;
pub mod version;

// Re-export all handler functions
pub use scan::handle_scan;
pub use test::handle_test;
pub use version::handle_version;
