//! # Segscope Testkit
//!
//! Test utilities for segscope.
//!
//! This crate provides:
//! - Temp-dir backed stores populated through the collection front-end
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segscope_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     let store = scenarios::repeated_sessions(2, 5);
//!     assert_eq!(store.snapshot().unwrap().segment_locs().len(), 2);
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
