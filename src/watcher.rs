use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::{Error, EvalError};
use crate::propagate::Propagation;
use crate::{Consumer, Mark, Node, NodeKind, NodeRef, Producer, Status};

pub struct Watcher {
	body: Rc<WatcherBody>,
}

impl Clone for Watcher {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

type NotifyCallback = Box<dyn Fn() -> Result<(), EvalError>>;

pub struct WatcherBody {
	notify: NotifyCallback,
	watched: RefCell<SmallVec<[WatchRecord; 4]>>,
	stale: Cell<bool>,
	this: Weak<WatcherBody>,
}

struct WatchRecord {
	node: NodeRef,
	producer: Rc<dyn Producer>,
	armed: u64,
}

impl Watcher {
	#[must_use]
	pub fn new(notify: NotifyCallback) -> Self {
		Watcher {
			body: Rc::new_cyclic(|this| WatcherBody {
				notify,
				watched: RefCell::new(SmallVec::new()),
				stale: Cell::new(false),
				this: this.clone(),
			}),
		}
	}

	/// An empty iterator re-arms without changing the watch list.
	pub fn watch(&self, nodes: impl IntoIterator<Item = NodeRef>) -> Result<(), Error> {
		let mut incoming = Vec::new();
		for node in nodes {
			let producer = node.producer().ok_or(Error::NotASignal)?;
			incoming.push((node, producer));
		}

		for (node, producer) in incoming {
			let present = self
				.body
				.watched
				.borrow()
				.iter()
				.any(|record| record.node == node);
			if present {
				continue;
			}
			self.body.watched.borrow_mut().push(WatchRecord {
				armed: producer.stamp(),
				node,
				producer: producer.clone(),
			});
			producer.attach(self.body.this.clone() as Weak<dyn Consumer>);
		}

		self.body.rearm();
		Ok(())
	}

	pub fn unwatch(&self, nodes: impl IntoIterator<Item = NodeRef>) -> Result<(), Error> {
		let mut outgoing = Vec::new();
		for node in nodes {
			node.producer().ok_or(Error::NotASignal)?;
			outgoing.push(node);
		}

		let owner = self.body.this.clone() as Weak<dyn Consumer>;
		for node in outgoing {
			let position = self
				.body
				.watched
				.borrow()
				.iter()
				.position(|record| record.node == node);
			if let Some(position) = position {
				let record = self.body.watched.borrow_mut().remove(position);
				record.producer.detach(&owner);
			}
		}
		Ok(())
	}

	/// Never evaluates anything.
	pub fn pending(&self) -> Vec<NodeRef> {
		self.body
			.watched
			.borrow()
			.iter()
			.filter(|record| {
				record.producer.status() != Status::Clean
					|| record.producer.stamp() != record.armed
			})
			.map(|record| record.node.clone())
			.collect()
	}

	pub fn sources(&self) -> Vec<NodeRef> {
		self.body
			.watched
			.borrow()
			.iter()
			.map(|record| record.node.clone())
			.collect()
	}

	pub fn as_node(&self) -> NodeRef {
		NodeRef::new(self.body.clone() as Rc<dyn Node>)
	}
}

impl WatcherBody {
	// Current stamps become the pending baseline.
	fn rearm(&self) {
		self.stale.set(false);
		for record in self.watched.borrow_mut().iter_mut() {
			record.armed = record.producer.stamp();
		}
	}

	pub(crate) fn run_notify(&self) -> Result<(), EvalError> {
		(self.notify)()
	}
}

impl Consumer for WatcherBody {
	fn mark(self: Rc<Self>, _mark: Mark, run: &mut Propagation) {
		if !self.stale.replace(true) {
			run.enqueue(self);
		}
	}

	fn as_sink_node(self: Rc<Self>) -> Rc<dyn Node> {
		self
	}
}

impl Node for WatcherBody {
	fn kind(&self) -> NodeKind {
		NodeKind::Watcher
	}

	fn sources(&self) -> Vec<NodeRef> {
		self.watched
			.borrow()
			.iter()
			.map(|record| record.node.clone())
			.collect()
	}

	fn sinks(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	fn as_producer(self: Rc<Self>) -> Option<Rc<dyn Producer>> {
		None
	}

	fn as_dyn_node(self: Rc<Self>) -> Rc<dyn Node> {
		self
	}
}

impl Drop for WatcherBody {
	fn drop(&mut self) {
		// Equivalent to unwatching everything: observed nodes must not
		// keep a back-edge to a watcher that no longer exists.
		let owner = self.this.clone() as Weak<dyn Consumer>;
		for record in self.watched.get_mut().iter() {
			record.producer.detach(&owner);
		}
	}
}

impl fmt::Debug for Watcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watcher")
			.field("watched", &self.body.watched.borrow().len())
			.field("stale", &self.body.stale.get())
			.finish()
	}
}
