#![forbid(unsafe_code)]

//! Resolves video page URLs and search phrases into direct, playable stream
//! links. Lookups go through `yt-dlp`; searches try `yt-dlp` first and fall
//! back to a chain of health-checked Invidious mirrors.

pub mod api;
pub mod backoff;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod http;
pub mod mirror;
pub mod models;
pub mod runner;
pub mod search;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;
