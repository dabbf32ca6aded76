use std::error;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Everything a graph operation can fail with.
#[derive(Debug, Clone, Error)]
pub enum Error {
	/// A state or computed node was touched while a watcher callback was
	/// running.
	#[error("node accessed during watcher notification")]
	NotificationPhase,

	/// A computed transitively read itself during its own evaluation. The
	/// node is left dirty so the next read attempts the evaluation again.
	#[error("dependency cycle detected during evaluation")]
	Cycle,

	/// A watcher was handed a node that cannot be observed.
	#[error("watchers can only observe state and computed nodes")]
	NotASignal,

	/// A user callback failed. For a computed this is the cached error,
	/// returned again on every read until a source changes; for a write it
	/// is the single failed watcher notification.
	#[error(transparent)]
	Eval(EvalError),

	/// More than one watcher callback failed during a single write. Every
	/// callback ran before this was surfaced.
	#[error("{} watcher callbacks failed", .0.len())]
	Aggregate(Vec<EvalError>),
}

/// A cheaply clonable user-callback failure. Computed nodes cache one of
/// these in place of a value and hand out clones on every read.
#[derive(Clone)]
pub struct EvalError(Rc<dyn error::Error + 'static>);

impl EvalError {
	pub fn new(err: impl error::Error + 'static) -> Self {
		EvalError(Rc::new(err))
	}

	pub fn msg(msg: impl fmt::Display) -> Self {
		EvalError(Rc::new(Message(msg.to_string())))
	}

	// Cycle failures travel through user callbacks via `?`, but must not
	// be cached like ordinary evaluation errors.
	pub(crate) fn is_cycle(&self) -> bool {
		matches!(self.0.downcast_ref::<Error>(), Some(Error::Cycle))
	}
}

impl fmt::Debug for EvalError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.0, f)
	}
}

impl fmt::Display for EvalError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl error::Error for EvalError {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		self.0.source()
	}
}

impl From<Error> for EvalError {
	fn from(err: Error) -> Self {
		EvalError(Rc::new(err))
	}
}

struct Message(String);

impl fmt::Debug for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(&self.0, f)
	}
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

impl error::Error for Message {}
