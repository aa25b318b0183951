//! `work` crate — the unit-of-work abstraction and its completion adapter.
//!
//! A node's work can signal completion three ways: by calling a [`Done`]
//! callback (immediately or on a later turn), by returning a future, or by
//! being a future wrapped behind a callback-shaped adapter. [`settle`] turns
//! all of them into one `Result<(), WorkError>`.

pub mod adapter;
pub mod binding;
pub mod error;
pub mod mock;
pub mod traits;
pub mod work;

pub use adapter::settle;
pub use binding::Binding;
pub use error::WorkError;
pub use traits::Task;
pub use work::{Done, Work, WorkResult, WorkStyle};
