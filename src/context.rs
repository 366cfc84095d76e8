//! Execution Context - request-scoped state threaded through selectors and filters
//!
//! One context is created per selection request. It carries:
//! - the build history being read and the build that started the request
//! - a snapshot of variable bindings
//! - the console sink and verbosity flag
//! - the active filter and the driver's last match
//! - selector-private extension records that survive between calls
//!
//! Cloning produces an independent context for a nested selection. Variables
//! are copied, cloneable extension records are deep-copied, and everything else
//! is shared by reference.

use std::any::{Any, TypeId};
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use run_model::{Build, BuildHistory, BuildRef};
use tracing::warn;

use crate::config::SelectorSettings;
use crate::error::ExtensionCloneError;
use crate::filters::Filter;
use crate::variables::Variables;

/// Bound on nested parameterized resolution within one request
pub const MAX_PARAMETER_DEPTH: usize = 16;

// ============================================================================
// CONSOLE
// ============================================================================

/// Destination for the per-request log lines the engine writes
pub trait ConsoleSink: Send + Sync + fmt::Debug {
    fn println(&self, line: &str);
}

/// Forwards console lines to `tracing` at INFO
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn println(&self, line: &str) {
        tracing::info!(target: "run_selector::console", "{}", line);
    }
}

/// Captures console lines in memory
#[derive(Debug, Default)]
pub struct BufferConsole {
    lines: Mutex<Vec<String>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    /// Whether any captured line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        lock(&self.lines).iter().any(|l| l.contains(needle))
    }
}

impl ConsoleSink for BufferConsole {
    fn println(&self, line: &str) {
        lock(&self.lines).push(line.to_string());
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// EXTENSION RECORDS
// ============================================================================

/// Selector-private state attached to a context
pub trait ContextExtension: Any + Send + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Records that can be copied into a cloned context return themselves here.
    fn as_cloneable(&self) -> Option<&dyn CloneableExtension> {
        None
    }
}

/// Deep-copy capability for extension records
pub trait CloneableExtension {
    fn clone_extension(&self) -> Result<Box<dyn ContextExtension>, ExtensionCloneError>;
}

/// Shared handle to one attached extension record.
///
/// Handles compare by identity: two handles are equal iff they point at the
/// same record.
#[derive(Clone)]
pub struct ExtensionHandle {
    type_id: TypeId,
    type_name: &'static str,
    record: Arc<Mutex<Box<dyn ContextExtension>>>,
}

impl ExtensionHandle {
    pub fn new<E: ContextExtension>(extension: E) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            record: Arc::new(Mutex::new(Box::new(extension))),
        }
    }

    fn from_boxed(type_name: &'static str, extension: Box<dyn ContextExtension>) -> Self {
        Self {
            type_id: extension.as_any().type_id(),
            type_name,
            record: Arc::new(Mutex::new(extension)),
        }
    }

    pub fn is<E: ContextExtension>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Runs `f` on the record if it is an `E`
    pub fn with<E: ContextExtension, R>(&self, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        let mut guard = lock(&*self.record);
        guard.as_any_mut().downcast_mut::<E>().map(f)
    }

    /// Copy for a cloned context: a fresh record when the extension is
    /// cloneable, otherwise this same record.
    fn duplicate(&self) -> ExtensionHandle {
        let guard = lock(&*self.record);
        let Some(cloneable) = guard.as_cloneable() else {
            warn!(
                extension = self.type_name,
                "Context extension is not cloneable, sharing it with the cloned context"
            );
            return self.clone();
        };
        match cloneable.clone_extension() {
            Ok(copy) => ExtensionHandle::from_boxed(self.type_name, copy),
            Err(e) => {
                warn!(
                    extension = self.type_name,
                    error = %e,
                    "Failed to clone context extension, sharing it with the cloned context"
                );
                self.clone()
            }
        }
    }
}

impl PartialEq for ExtensionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for ExtensionHandle {}

impl fmt::Debug for ExtensionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtensionHandle")
            .field(&self.type_name)
            .finish()
    }
}

// ============================================================================
// EXECUTION CONTEXT
// ============================================================================

pub struct ExecutionContext<'h> {
    history: &'h dyn BuildHistory,
    origin: Option<BuildRef>,
    variables: Variables,
    verbose: bool,
    console: Arc<dyn ConsoleSink>,
    settings: Arc<SelectorSettings>,
    filter: Filter,
    last_match: Option<&'h Build>,
    extensions: Vec<ExtensionHandle>,
    parameter_depth: Cell<usize>,
}

impl<'h> ExecutionContext<'h> {
    pub fn new(history: &'h dyn BuildHistory) -> Self {
        Self {
            history,
            origin: None,
            variables: Variables::new(),
            verbose: false,
            console: Arc::new(TracingConsole),
            settings: Arc::new(SelectorSettings::default()),
            filter: Filter::AcceptAll,
            last_match: None,
            extensions: Vec::new(),
            parameter_depth: Cell::new(0),
        }
    }

    /// Build whose trigger causes upstream selection walks
    pub fn with_origin(mut self, origin: BuildRef) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_console(mut self, console: Arc<dyn ConsoleSink>) -> Self {
        self.console = console;
        self
    }

    pub fn with_settings(mut self, settings: Arc<SelectorSettings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn history(&self) -> &'h dyn BuildHistory {
        self.history
    }

    pub fn origin(&self) -> Option<&BuildRef> {
        self.origin.as_ref()
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Candidate the driver received from the most recent selector call
    pub fn last_match(&self) -> Option<&'h Build> {
        self.last_match
    }

    pub fn set_last_match(&mut self, build: Option<&'h Build>) {
        self.last_match = build;
    }

    // ------------------------------------------------------------------------
    // Variables and logging
    // ------------------------------------------------------------------------

    /// Substitutes bound variables in `template`; unbound references are kept.
    pub fn expand(&self, template: &str) -> String {
        self.variables.expand(template)
    }

    pub fn log_info(&self, args: fmt::Arguments<'_>) {
        self.console.println(&args.to_string());
    }

    /// No-op unless the request is verbose
    pub fn log_debug(&self, args: fmt::Arguments<'_>) {
        if self.verbose {
            self.console.println(&args.to_string());
        }
    }

    /// Writes `message` followed by the error and its sources.
    pub fn log_error(&self, message: &str, error: &dyn std::error::Error) {
        self.console.println(&format!("{}: {}", message, error));
        let mut source = error.source();
        while let Some(cause) = source {
            self.console.println(&format!("  caused by: {}", cause));
            source = cause.source();
        }
    }

    // ------------------------------------------------------------------------
    // Extensions
    // ------------------------------------------------------------------------

    pub fn add_extension<E: ContextExtension>(&mut self, extension: E) -> ExtensionHandle {
        let handle = ExtensionHandle::new(extension);
        self.extensions.push(handle.clone());
        handle
    }

    /// First attached record of type `E`
    pub fn get_extension<E: ContextExtension>(&self) -> Option<ExtensionHandle> {
        self.extensions.iter().find(|h| h.is::<E>()).cloned()
    }

    /// Runs `f` on the first attached record of type `E`
    pub fn with_extension<E: ContextExtension, R>(
        &self,
        f: impl FnOnce(&mut E) -> R,
    ) -> Option<R> {
        self.extensions.iter().find(|h| h.is::<E>())?.with(f)
    }

    /// Detaches exactly this record. Returns whether it was attached.
    pub fn remove_extension(&mut self, handle: &ExtensionHandle) -> bool {
        match self.extensions.iter().position(|h| h == handle) {
            Some(index) => {
                self.extensions.remove(index);
                true
            }
            None => false,
        }
    }

    /// Detaches every record of type `E`, then attaches `extension`. Returns
    /// whether anything was detached.
    pub fn replace_extension<E: ContextExtension>(&mut self, extension: E) -> bool {
        let before = self.extensions.len();
        self.extensions.retain(|h| !h.is::<E>());
        let removed = self.extensions.len() != before;
        self.add_extension(extension);
        removed
    }

    pub fn extensions(&self) -> &[ExtensionHandle] {
        &self.extensions
    }

    // ------------------------------------------------------------------------
    // Nested parameter resolution
    // ------------------------------------------------------------------------

    /// Runs `f` one parameter level deeper, or returns `None` (after logging)
    /// when the depth limit is reached.
    pub(crate) fn nested<R>(&self, f: impl FnOnce(&Self) -> R) -> Option<R> {
        self.enter_parameter()?;
        let result = f(self);
        self.parameter_depth.set(self.parameter_depth.get() - 1);
        Some(result)
    }

    pub(crate) fn nested_mut<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        self.enter_parameter()?;
        let result = f(self);
        self.parameter_depth.set(self.parameter_depth.get() - 1);
        Some(result)
    }

    fn enter_parameter(&self) -> Option<()> {
        let depth = self.parameter_depth.get();
        if depth >= MAX_PARAMETER_DEPTH {
            self.log_info(format_args!(
                "Parameters nested more than {} levels deep, giving up",
                MAX_PARAMETER_DEPTH
            ));
            return None;
        }
        self.parameter_depth.set(depth + 1);
        Some(())
    }
}

impl Clone for ExecutionContext<'_> {
    fn clone(&self) -> Self {
        Self {
            history: self.history,
            origin: self.origin.clone(),
            variables: self.variables.clone(),
            verbose: self.verbose,
            console: Arc::clone(&self.console),
            settings: Arc::clone(&self.settings),
            filter: self.filter.clone(),
            last_match: self.last_match,
            extensions: self
                .extensions
                .iter()
                .map(ExtensionHandle::duplicate)
                .collect(),
            parameter_depth: Cell::new(self.parameter_depth.get()),
        }
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("origin", &self.origin)
            .field("variables", &self.variables)
            .field("verbose", &self.verbose)
            .field("filter", &self.filter)
            .field("last_match", &self.last_match.map(Build::build_ref))
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}
