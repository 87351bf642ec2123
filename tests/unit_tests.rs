//! Component-level tests, grouped under `tests/unit/`.

mod unit;
