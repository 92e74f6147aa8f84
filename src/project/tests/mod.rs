//! Unit tests for project ownership records.
