//! A tiny, embeddable shell.
//!
//! A line goes through three stages:
//! - [`lexer`] splits it into tokens, resolving quotes, escapes and `$NAME` substitutions;
//! - [`parser`] groups the tokens into a [`parser::Pipeline`], classifying every command
//!   through a [`registry::CommandRegistry`];
//! - [`pipeline`] runs the stages in order, feeding each one's output to the next, and
//!   hands every stage to the [`dispatcher`], which runs built-ins in-process and
//!   everything else through [`external`].
//!
//! The main entry point is [`Interpreter`], which owns the [`env::Environment`] shared by
//! every command. The [`command`] and [`io_adapters`] modules expose the stream
//! abstractions stages read from and write to.

mod builtin;
pub mod command;
pub mod dispatcher;
pub mod env;
pub mod external;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod registry;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
