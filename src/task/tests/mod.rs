//! Unit tests for the task distribution core.
#![expect(
    clippy::panic_in_result_fn,
    reason = "tests assert on outcomes while propagating setup errors with `?`"
)]
