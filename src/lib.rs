//! Run Selector - pick one build out of a job's history
//!
//! A [`Selector`] enumerates candidate builds; a [`Filter`] accepts or declines
//! each one. The driver ([`Selector::select`]) returns the first accepted
//! candidate. Both can be written as expressions and passed through build
//! parameters, then decoded with [`codec`].
//!
//! ```text
//! select("app", (status :build-status "successful"), (not :filter (display-name :name "broken")))
//!     -> newest stable-or-unstable build of "app" not named "broken"
//! ```
//!
//! ## Modules
//!
//! - [`context`]: per-request state, console and extension records
//! - [`filters`]: the filter algebra
//! - [`selectors`]: selector variants and the pick loop
//! - [`codec`]: expression encoding and decoding
//! - [`parameters`]: selector and filter parameter definitions
//! - [`request`]: the entry point that applies defaults and reports errors
//! - [`config`]: process-wide selector settings

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod parameters;
pub mod request;
pub mod selectors;
pub mod variables;

pub use codec::{decode_filter, decode_selector, encode_filter, encode_selector};
pub use config::{SelectorSettings, SettingsLoader, UpstreamOrder, CONFIG_ENV_VAR};
pub use context::{
    BufferConsole, CloneableExtension, ConsoleSink, ContextExtension, ExecutionContext,
    ExtensionHandle, TracingConsole,
};
pub use error::{DecodeError, ExtensionCloneError, SelectorError};
pub use filters::Filter;
pub use parameters::{FilterParameter, ParameterValue, SelectorParameter};
pub use request::{select, SelectRun};
pub use selectors::{BuildStatus, FallbackEntry, Selector, UpstreamQueue, UpstreamStrategy};
pub use variables::Variables;

pub use run_model;
