//! Observability hooks
//!
//! Optional callbacks fired synchronously after a decision is finalized.
//! The dispatcher enforces a no-throw contract: a panicking hook is caught,
//! logged, and never alters or aborts the already-computed decision.

use crate::LimiterError;
use crate::decision::Decision;
use std::panic::{AssertUnwindSafe, catch_unwind};

type DecisionHook = Box<dyn Fn(&str, &Decision) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&LimiterError) + Send + Sync>;

/// Optional allow/block/error callbacks.
///
/// # Examples
///
/// ```
/// use tidegate::EventHooks;
///
/// let hooks = EventHooks::new()
///     .on_block(|identity, decision| {
///         eprintln!("blocked {identity}, retry in {:?}", decision.retry_after());
///     })
///     .on_error(|err| {
///         eprintln!("backend trouble: {err}");
///     });
/// ```
#[derive(Default)]
pub struct EventHooks {
	on_allow: Option<DecisionHook>,
	on_block: Option<DecisionHook>,
	on_error: Option<ErrorHook>,
}

impl EventHooks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Called after every admitted request.
	pub fn on_allow(mut self, hook: impl Fn(&str, &Decision) + Send + Sync + 'static) -> Self {
		self.on_allow = Some(Box::new(hook));
		self
	}

	/// Called after every denied request.
	pub fn on_block(mut self, hook: impl Fn(&str, &Decision) + Send + Sync + 'static) -> Self {
		self.on_block = Some(Box::new(hook));
		self
	}

	/// Called once per backend failure, before the fail strategy produces
	/// the substitute decision.
	pub fn on_error(mut self, hook: impl Fn(&LimiterError) + Send + Sync + 'static) -> Self {
		self.on_error = Some(Box::new(hook));
		self
	}

	pub(crate) fn dispatch_decision(&self, identity: &str, decision: &Decision) {
		let hook = if decision.allowed() {
			self.on_allow.as_ref()
		} else {
			self.on_block.as_ref()
		};
		if let Some(hook) = hook {
			isolate(|| hook(identity, decision));
		}
	}

	pub(crate) fn dispatch_error(&self, err: &LimiterError) {
		if let Some(hook) = &self.on_error {
			isolate(|| hook(err));
		}
	}
}

impl std::fmt::Debug for EventHooks {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventHooks")
			.field("on_allow", &self.on_allow.is_some())
			.field("on_block", &self.on_block.is_some())
			.field("on_error", &self.on_error.is_some())
			.finish()
	}
}

/// Runs a hook, containing any panic so it cannot reach the caller of
/// `allow` or change the decision.
fn isolate(hook: impl FnOnce()) {
	if catch_unwind(AssertUnwindSafe(hook)).is_err() {
		tracing::warn!("rate limit hook panicked; decision is unaffected");
	}
}
