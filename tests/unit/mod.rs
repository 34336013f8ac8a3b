//! Unit test suite for function-kcl
//!
//! Property-style tests of the merge engine and the dispatcher through the
//! public API.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod dispatch_properties;
