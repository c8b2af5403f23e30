//! Runtime invariant checks with contract-test bookkeeping
//!
//! Recording code asserts its invariants through [`assert_invariant!`].
//! Each checked invariant is remembered per thread, so a test can drive the
//! recorder and then call [`contract_test`] to prove that the invariants it
//! cares about were actually exercised, not just never violated.
//!
//! ```rust,ignore
//! use crabwatch::assert_invariant;
//! use crabwatch::invariant_ppt::contract_test;
//!
//! assert_invariant!(
//!     open_segments <= 1,
//!     "At most one segment is open",
//!     "recording::segment"
//! );
//!
//! #[test]
//! fn contract_single_writer() {
//!     // ... drive a pipeline ...
//!     contract_test("single writer", &["At most one segment is open"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static CHECKED: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and record that it was checked.
///
/// Panics with the message (and optional context) when the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant(condition: bool, message: &str, context: Option<&str>) {
    CHECKED.with(|checked| {
        checked.borrow_mut().insert(message.to_string());
    });

    if !condition {
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// Panic unless every listed invariant was checked on this thread.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let checked = CHECKED.with(|checked| checked.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !checked.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Forget all recorded checks on this thread
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
