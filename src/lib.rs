//! Retrieval-augmented grading of free-text answers.
//!
//! A question/answer pair flows through a fixed pipeline:
//!
//! ```text
//! request -> cache? -> triage -> expansion -> parallel retrieval fan-out
//!                        |                          |
//!                     0 / 5 short-circuit        rerank
//!                                                   |
//!                      checklist -> rubric -> bonus -> result
//! ```
//!
//! Retrieval fans out one similarity search per query variant (original
//! question, paraphrases, the answer itself) plus a keyword scan, merges
//! the deduplicated candidates and reranks them with a cross-encoder
//! sidecar. Grading decomposes the question into a weighted checklist,
//! asks the model for a coverage category per item and computes all
//! points locally.
//!
//! Modules:
//! - [`config`]: environment-driven configuration
//! - [`models`]: chunk, request and result types plus the score bands
//! - [`llm`]: provider abstraction, retry policy, JSON extraction, reranker
//! - [`search`]: chunk store, similarity/keyword search, fan-out
//! - [`eval`]: the pipeline stages and the evaluation cache
//! - [`api`]: axum handlers
//! - [`state`]: shared application state

pub mod api;
pub mod config;
pub mod eval;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
