//! Feed ingestion and scheduling engine for the verse content aggregator.
//!
//! Polls a set of syndication sources, normalizes their entries into items
//! and upserts them into a store without clobbering locally accrued scores.

pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
