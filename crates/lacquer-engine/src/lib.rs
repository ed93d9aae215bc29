//! Blocking stylesheet compiler for the Lacquer language.
//!
//! The engine takes stylesheet text (or a file), expands `@import`s,
//! evaluates declaration values, flattens nested rules and renders CSS in
//! one of four output styles. It is synchronous and self-contained: calls
//! block the calling thread until the compile finishes.
//!
//! Host integration happens through two hook traits. An [`ImportHook`]
//! takes over `@import` resolution and an implementation of
//! [`FunctionHost`] services function calls found in declaration values.
//! Both are called in the middle of a compile, on whatever thread the
//! compile runs on; implementations that need to reach another thread must
//! arrange that rendezvous themselves.

mod ast;
mod compile;
mod error;
mod hooks;
mod options;
mod parser;

pub use compile::{compile, compile_file, CompileOutput};
pub use error::{EngineError, HookError};
pub use hooks::{FunctionHost, ImportEntry, ImportHook};
pub use options::{EngineOptions, OutputStyle, DEFAULT_PRECISION};

// The value model lives in its own crate so hosts can depend on it without
// pulling in the compiler.
pub use lacquer_value::{Separator, Value, ValueError};
