//! Integration and property tests for genemrf live under `tests/`.
