use std::cell::{Cell, RefCell};
use std::rc::Weak;

use crate::{Node, NodeRef};

// Engine-wide state is thread-local: graphs are single-threaded, and a
// node is only ever touched by the thread that created it.

thread_local! {
	static CLOCK: Cell<u64> = Cell::new(0);
	static NOTIFYING: Cell<bool> = Cell::new(false);
	static EVALUATING: RefCell<Vec<Weak<dyn Node>>> = RefCell::new(Vec::new());
}

/// Current value of the monotonic change clock.
pub(crate) fn clock() -> u64 {
	CLOCK.with(|clock| clock.get())
}

/// Advance the change clock and return the new value. Called exactly once
/// per observable change, so a stamp doubles as a happened-before mark.
pub(crate) fn bump_clock() -> u64 {
	CLOCK.with(|clock| {
		let next = clock.get() + 1;
		clock.set(next);
		next
	})
}

pub(crate) fn in_notification() -> bool {
	NOTIFYING.with(|flag| flag.get())
}

pub(crate) fn enter_notification() -> NotificationGuard {
	NotificationGuard {
		prev: NOTIFYING.with(|flag| flag.replace(true)),
	}
}

pub(crate) struct NotificationGuard {
	prev: bool,
}

impl Drop for NotificationGuard {
	fn drop(&mut self) {
		let prev = self.prev;
		NOTIFYING.with(|flag| flag.set(prev));
	}
}

pub(crate) fn enter_evaluation(node: Weak<dyn Node>) -> EvaluationGuard {
	EVALUATING.with(|stack| stack.borrow_mut().push(node));
	EvaluationGuard { _private: () }
}

pub(crate) struct EvaluationGuard {
	_private: (),
}

impl Drop for EvaluationGuard {
	fn drop(&mut self) {
		EVALUATING.with(|stack| {
			stack.borrow_mut().pop();
		});
	}
}

/// The computed currently being evaluated on this thread, if any.
pub fn current_computed() -> Option<NodeRef> {
	EVALUATING.with(|stack| {
		stack
			.borrow()
			.last()
			.and_then(|node| node.upgrade())
			.map(NodeRef::new)
	})
}
