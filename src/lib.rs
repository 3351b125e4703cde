//! Run small batches of fallible async operations concurrently, with
//! cancellation and timeout.
//!
//! A [`Batch`] collects independently-specified operations together with the
//! caller-owned slots their results should land in. Awaiting [`Batch::run`]
//! drives every operation concurrently, writes each produced value into its
//! slot, and resolves to the first failure observed — an operation error, a
//! failed result assignment, a timeout, or a cancellation — while signalling
//! the remaining operations to stop.
//!
//! This crate does not spawn tasks and does not depend on a specific async
//! runtime: the whole batch is a single composed future, driven by whichever
//! executor awaits it. Cancellation is cooperative and flows through a
//! [`CancellationToken`]; operations are never interrupted mid-body, and a
//! cancelled batch still waits for its in-flight operations to return before
//! resolving.
//!
//! # Examples
//!
//! Fan out two differently-typed operations and collect both results:
//!
//! ```rust
//! use async_batch::{Batch, CancellationToken};
//! use futures_lite::future::block_on;
//!
//! let mut x = 0;
//! let mut y = String::new();
//!
//! let res = block_on(
//!     Batch::<std::io::Error>::new()
//!         .task(&mut x, async { Ok(Some(42)) })
//!         .task(&mut y, async { Ok(Some(String::from("hello"))) })
//!         .run(&CancellationToken::new()),
//! );
//!
//! assert!(res.is_ok());
//! assert_eq!(x, 42);
//! assert_eq!(y, "hello");
//! ```
//!
//! Bound the whole batch with a deadline:
//!
//! ```rust
//! use async_batch::{Batch, CancellationToken};
//! use async_io::Timer;
//! use futures_lite::future::block_on;
//! use std::time::Duration;
//!
//! let mut out = 0u64;
//!
//! let res = block_on(
//!     Batch::<std::io::Error>::new()
//!         .with_timeout(Duration::from_millis(5))
//!         .task(&mut out, async {
//!             Timer::after(Duration::from_millis(50)).await;
//!             Ok(Some(7))
//!         })
//!         .run(&CancellationToken::new()),
//! );
//!
//! assert!(res.unwrap_err().is_timeout());
//! assert_eq!(out, 0);
//! ```
//!
//! # Error semantics
//!
//! `run` reports exactly one error per execution: the first one observed
//! across all units. When several operations fail close together, which of
//! them is reported is a race; the batch makes no tie-break guarantee. Slots
//! already written by units that succeeded before a sibling failed are *not*
//! rolled back; the batch has no transactional semantics.

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod batch;
mod error;
mod run;
mod slot;

pub use batch::Batch;
pub use error::{BatchError, BindError};
pub use run::Run;

/// The cancellation primitive accepted by [`Batch::run`]. Re-exported from
/// `tokio_util` for convenience.
#[doc(no_inline)]
pub use tokio_util::sync::CancellationToken;
