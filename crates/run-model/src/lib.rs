//! Run Model - build history data structures
//!
//! Read-only view of a job scheduler's build history as the selection engine
//! sees it: jobs, their numbered builds, completion results, trigger causes and
//! named permalinks. The engine never mutates anything in here.
//!
//! ## Contents
//!
//! - [`JobId`], [`BuildRef`]: identities
//! - [`Build`], [`BuildResult`], [`Cause`]: one build record
//! - [`Job`], [`Permalink`]: a job's ordered history and its named anchors
//! - [`BuildHistory`]: the lookup seam the host implements
//! - [`InMemoryHistory`], [`HistorySnapshot`]: a materialized history loadable
//!   from YAML or JSON

pub mod build;
pub mod history;
pub mod job;

pub use build::{Build, BuildRef, BuildRefParseError, BuildResult, Cause, JobId};
pub use history::{BuildHistory, HistoryError, HistorySnapshot, InMemoryHistory, JobSnapshot};
pub use job::{Job, Permalink};
