//! askdb: a natural-language-to-SQL gateway.
//!
//! A question comes in over HTTP; the service assembles context (optionally
//! from a Jira issue), introspects the DuckDB schema, asks an AI backend for
//! SQL, guards the statement against writes, executes it with row and time
//! ceilings, and asks the backend to explain the rows. The preferred backend
//! is configurable (a remote agent service or a direct LLM API); agent mode
//! falls back to the direct backend once per request.

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod jira;
pub mod pipeline;
pub mod util;
pub mod web;
