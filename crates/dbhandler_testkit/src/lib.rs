//! # DBHandler Testkit
//!
//! Test utilities for DBHandler.
//!
//! This crate provides:
//! - Temporary stores and on-disk datasets
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dbhandler_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     for_each_backend(|store| {
//!         store.put_data(&sample_image(0, 8, 8), &sample_annotation(0), 0).unwrap();
//!         assert_eq!(store.len().unwrap(), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
