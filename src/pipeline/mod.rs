//! Pipeline stages for turning generated text into presentable documents.
//!
//! Each submodule implements exactly one transformation step. Every stage
//! here is pure: no I/O, no shared mutable state, so stages can be tested
//! in isolation and called from any task.
//!
//! ## Data Flow
//!
//! ```text
//!                                                 ┌──▶ html ──────────────▶ (pdf engines)
//! postprocess ──▶ kind ──▶ classify ──▶ build ────┤
//!  (cleanup)    (detect)   (roles)    (blocks)    └──▶ docx ──▶ container ──▶ .docx bytes
//! ```
//!
//! 1. [`postprocess`]: deterministic cleanup rules for model quirks
//! 2. [`kind`]: pick the document kind once, from the whole text
//! 3. [`classify`]: lazy line classifier: a rule table per kind plus an
//!    explicit state machine (flowchart runs, tables of contents)
//! 4. [`build`]: assemble roles into [`crate::model::Block`]s and attach
//!    styles from [`style`]
//! 5. [`html`] / [`docx`]: two renderers reading the same style data
//! 6. [`container`]: write the document tree as an Office Open XML package
//!
//! [`inline`] holds the span-level helpers (emphasis stripping, reference
//! parsing) shared by the classifier and builder.

pub mod build;
pub mod classify;
pub mod container;
pub mod docx;
pub mod html;
pub mod inline;
pub mod kind;
pub mod postprocess;
pub mod style;
