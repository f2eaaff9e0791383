//! Integration tests for the orchestration core
//!
//! Tests are organized by topic:
//! - `cache` - Content-addressed memoization, pin eviction, build laziness
//! - `study` - Sweep expansion, worker pool, aggregation, cancellation

mod study;
