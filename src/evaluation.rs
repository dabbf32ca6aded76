use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dependencies::Dependencies;
use crate::Producer;

/// Capture context for one computed evaluation.
pub struct Evaluation {
	deps: RefCell<Dependencies>,
	muted: Cell<bool>,
}

impl AsRef<Evaluation> for Evaluation {
	fn as_ref(&self) -> &Evaluation {
		self
	}
}

impl Evaluation {
	pub(crate) fn new() -> Self {
		Evaluation {
			deps: RefCell::new(Dependencies::new()),
			muted: Cell::new(false),
		}
	}

	pub(crate) fn record(&self, source: Rc<dyn Producer>, stamp: u64) {
		if self.muted.get() {
			return;
		}
		self.deps.borrow_mut().record(source, stamp);
	}

	pub(crate) fn take(self) -> Dependencies {
		self.deps.into_inner()
	}

	/// Runs `func` with dependency capture disabled. Capture is restored
	/// on both normal return and unwind.
	pub fn untrack<R>(&self, func: impl FnOnce() -> R) -> R {
		struct Unmute<'a> {
			muted: &'a Cell<bool>,
			prev: bool,
		}

		impl Drop for Unmute<'_> {
			fn drop(&mut self) {
				self.muted.set(self.prev);
			}
		}

		let _restore = Unmute {
			prev: self.muted.replace(true),
			muted: &self.muted,
		};
		func()
	}
}
