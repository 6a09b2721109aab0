//! `weft_core` is the engine behind `weft`, a literate-documentation tool.
//! Documentation lives in the comments of source files and is marked up with
//! small directives. The engine collects the
//! marked regions into named blocks and composes them, following `include`
//! references, into one ordered document of prose and code lines.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source file + comment syntax
//!   → Lexer (strips comment delimiters, finds directives, tracks code/doc mode)
//!   → Pass (collects named blocks from one or more files into one namespace)
//!   → Resolver (expands includes depth-first with cycle detection)
//!   → Vec<OutputLine { text, mode }>
//! ```
//!
//! ## Directives
//!
//! Directives are written inside comments and start with a sigil (`@` by
//! default):
//!
//! - `@start(name)` / `@(name)` open and close a named block. A bare `@`
//!   closes the innermost block.
//! - `@cstart(name)` opens a block that starts in code mode.
//! - `@code` / `@edoc` switch between verbatim code and documentation.
//! - `@include(name)` inserts another block at the marker's indentation.
//!   `@include(name, file)` takes the block from one file of the pass.
//! - `@define(name, value)` and `@define(name)` … `@enifed(name)` define
//!   macros that `@subst(name)` expands inside content lines, next to the
//!   built-ins `__file__` and `__line__`.
//! - `@indent N` shifts the following lines of the block by `N` columns.
//! - `@if(token)` / `@fi(token)` keep a region only when `token` is active.
//! - `@ignore` drops the marker line.
//!
//! Lines at the top of a file belong to the anonymous block `""`, which is
//! what a document is usually composed from.
//!
//! ## Modules
//!
//! - [`config`] loads `weft.toml` and builds the [`LanguageRegistry`].
//! - [`syntax`] describes comment syntax through the [`CommentAdapter`]
//!   trait and ships presets for common languages.
//!
//! ## Quick Start
//!
//! ```rust
//! use weft_core::CommentSyntax;
//! use weft_core::LexOptions;
//! use weft_core::Pass;
//!
//! let source = "\
//! // Greeting
//! //
//! //   @include(hello)
//! // @()
//!
//! // @start(hello)
//! // hello
//! // @(hello)
//! ";
//!
//! let mut pass = Pass::new();
//! pass.add_source("greet.c", source, &CommentSyntax::c_like(), &LexOptions::default())?;
//!
//! let lines = pass.resolve("")?;
//! let text: Vec<_> = lines.iter().map(|line| line.text.as_str()).collect();
//! assert_eq!(text, ["Greeting", "", "  hello"]);
//! # Ok::<(), weft_core::WeftError>(())
//! ```

pub use check::*;
pub use config::*;
pub use directive::*;
pub use error::*;
pub use lexer::*;
pub use pass::*;
pub use resolver::*;
pub use syntax::*;

mod check;
pub mod config;
mod directive;
#[allow(unused_assignments)]
mod error;
mod lexer;
mod pass;
mod resolver;
pub mod syntax;

#[cfg(test)]
mod __fixtures;
