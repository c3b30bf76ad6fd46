//! Conversational journal assistant.
//!
//! Quill answers natural-language requests about a user's journal of
//! categorized entries (shopping items, reminders, notes, todos) by running a
//! bounded tool-calling loop against a language model. The model may add
//! entries or query them; every store access is scoped to the authenticated
//! owner, never to anything the model supplies.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with an owner-scoped `entries` table and an
//!   `entry_log` audit trail
//! - **Model**: any OpenAI-compatible chat completions endpoint, buffered or
//!   streaming, with native tool calling
//! - **Loop**: at most `max_steps` model rounds per request, capabilities
//!   executed in emission order
//! - **Transport**: JSON and server-sent events over HTTP, plus a CLI
//!
//! # Modules
//!
//! - [`agent`]: The orchestration loop, cancellation and streaming
//! - [`capabilities`]: `add_entry` / `query_entries` declarations and execution
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`context`]: Renders the owner's entries into the model's system prompt
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`filter`]: The `[Filtering by X category]` marker codec
//! - [`journal`]: Entry types and the owner-scoped store
//! - [`model`]: Model service trait and the OpenAI-compatible client
//! - [`server`]: HTTP routes
//! - [`session`]: Bearer credential to owner resolution

pub mod agent;
pub mod capabilities;
pub mod config;
pub mod context;
pub mod db;
pub mod filter;
pub mod journal;
pub mod model;
pub mod server;
pub mod session;
