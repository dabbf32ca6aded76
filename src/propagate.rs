use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::addr;
use crate::context;
use crate::error::{Error, EvalError};
use crate::watcher::WatcherBody;
use crate::{Consumer, NodeRef};

// Only watcher-rooted consumers hold a back-edge; any edge at all means
// the producer is live.
pub(crate) struct Sinks {
	edges: SmallVec<[Weak<dyn Consumer>; 2]>,
}

impl Sinks {
	pub(crate) fn new() -> Self {
		Sinks {
			edges: SmallVec::new(),
		}
	}

	pub(crate) fn is_live(&self) -> bool {
		!self.edges.is_empty()
	}

	pub(crate) fn insert(&mut self, sink: Weak<dyn Consumer>) {
		let key = addr::weak_thin(&sink);
		if self.edges.iter().any(|edge| addr::weak_thin(edge) == key) {
			return;
		}
		self.edges.push(sink);
	}

	pub(crate) fn remove(&mut self, sink: &Weak<dyn Consumer>) {
		let key = addr::weak_thin(sink);
		self.edges.retain(|edge| addr::weak_thin(edge) != key);
	}

	pub(crate) fn collect(&mut self) -> SmallVec<[Rc<dyn Consumer>; 2]> {
		self.edges.retain(|edge| edge.upgrade().is_some());
		self.edges.iter().filter_map(Weak::upgrade).collect()
	}

	pub(crate) fn nodes(&self) -> Vec<NodeRef> {
		self.edges
			.iter()
			.filter_map(Weak::upgrade)
			.map(|sink| NodeRef::new(sink.as_sink_node()))
			.collect()
	}
}

/// The watchers discovered by one marking walk, in discovery order.
pub struct Propagation {
	queue: SmallVec<[Rc<WatcherBody>; 2]>,
}

impl Propagation {
	pub(crate) fn new() -> Self {
		Propagation {
			queue: SmallVec::new(),
		}
	}

	pub(crate) fn enqueue(&mut self, watcher: Rc<WatcherBody>) {
		self.queue.push(watcher);
	}

	// Every callback runs before any failure surfaces.
	pub(crate) fn deliver(self) -> Result<(), Error> {
		if self.queue.is_empty() {
			return Ok(());
		}

		tracing::trace!(watchers = self.queue.len(), "delivering notifications");

		let mut failures: Vec<EvalError> = Vec::new();
		{
			let _phase = context::enter_notification();
			for watcher in self.queue {
				if let Err(err) = watcher.run_notify() {
					failures.push(err);
				}
			}
		}

		if failures.is_empty() {
			Ok(())
		} else if failures.len() == 1 {
			Err(Error::Eval(failures.remove(0)))
		} else {
			Err(Error::Aggregate(failures))
		}
	}
}
