//! RouteSage - LLM-assisted documentation for FastAPI routes
//!
//! Statically extracts route declarations from a Python project, enriches each one
//! with an LLM-written description and tags (through a response cache, a rate limiter
//! and a retry controller) and exports the result as Markdown or JSON. Optionally the
//! descriptions and tags are written back into the route decorators.

pub mod cache;
pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod extractor;
pub mod limiter;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod telemetry;
pub mod writeback;
