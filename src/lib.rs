//! A reactive value graph: writable [`State`] cells, lazily recomputed
//! [`Computed`] values, and [`Watcher`]s that are notified synchronously
//! when anything they observe may have gone stale.

pub mod macros;

mod addr;
mod computed;
mod r#const;
mod context;
mod dependencies;
mod error;
mod evaluation;
mod options;
mod propagate;
mod state;
mod value;
mod watcher;

use std::fmt;
use std::rc::{Rc, Weak};

pub use computed::Computed;
pub use context::current_computed;
pub use dependencies::Dependencies;
pub use error::{Error, EvalError};
pub use evaluation::Evaluation;
pub use options::Options;
pub use propagate::Propagation;
pub use r#const::Const;
pub use state::State;
pub use value::{Access, Ref, Value};
pub use watcher::Watcher;

/// What a node is. Returned by [`NodeRef::kind`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum NodeKind {
	State,
	Computed,
	Watcher,
	Const,
}

/// Staleness colour of a value-bearing node.
///
/// `Checked` means an ancestor changed and the node must re-verify its
/// sources before its cached value can be trusted; `Dirty` means a direct
/// source changed and the node must recompute.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Status {
	Clean,
	Checked,
	Dirty,
}

/// The stain a write spreads through the sink graph: direct sinks of the
/// written cell become `Dirty`, everything further up becomes `Checked`.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Mark {
	Checked,
	Dirty,
}

/// Common surface of every graph entity, used for erased handles and
/// introspection.
pub trait Node: 'static {
	fn kind(&self) -> NodeKind;

	/// The ordered sources recorded by this node's most recent evaluation
	/// (for a watcher, its watch list).
	fn sources(&self) -> Vec<NodeRef>;

	/// The live sinks currently holding a back-edge to this node.
	fn sinks(&self) -> Vec<NodeRef>;

	fn as_producer(self: Rc<Self>) -> Option<Rc<dyn Producer>>;

	fn as_dyn_node(self: Rc<Self>) -> Rc<dyn Node>;
}

/// A node whose value can be observed: state, computed, or const.
pub trait Producer: Node {
	/// Bring this producer fully up to date and return its change stamp.
	fn refresh(&self) -> Result<u64, Error>;

	/// The current change stamp. Two reads of an unchanged producer see
	/// the same stamp.
	fn stamp(&self) -> u64;

	fn status(&self) -> Status;

	/// Install a live back-edge. Called when `sink` starts observing this
	/// producer through a watcher-rooted path.
	fn attach(&self, sink: Weak<dyn Consumer>);

	/// Remove a live back-edge.
	fn detach(&self, sink: &Weak<dyn Consumer>);
}

/// A node that observes producers: a computed or a watcher.
pub trait Consumer: 'static {
	/// Stain this consumer during write propagation. Watchers touched for
	/// the first time since their last arm enqueue themselves on `run`.
	fn mark(self: Rc<Self>, mark: Mark, run: &mut Propagation);

	fn as_sink_node(self: Rc<Self>) -> Rc<dyn Node>;
}

/// Cheap erased handle to any node, compared by node identity.
#[derive(Clone)]
pub struct NodeRef {
	node: Rc<dyn Node>,
}

impl NodeRef {
	pub(crate) fn new(node: Rc<dyn Node>) -> Self {
		NodeRef { node }
	}

	pub fn kind(&self) -> NodeKind {
		self.node.kind()
	}

	pub fn sources(&self) -> Vec<NodeRef> {
		self.node.sources()
	}

	pub fn sinks(&self) -> Vec<NodeRef> {
		self.node.sinks()
	}

	pub fn has_sources(&self) -> bool {
		!self.node.sources().is_empty()
	}

	pub fn has_sinks(&self) -> bool {
		!self.node.sinks().is_empty()
	}

	pub(crate) fn producer(&self) -> Option<Rc<dyn Producer>> {
		self.node.clone().as_producer()
	}
}

impl PartialEq for NodeRef {
	fn eq(&self, other: &Self) -> bool {
		addr::rc_thin(&self.node) == addr::rc_thin(&other.node)
	}
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?}({:p})", self.node.kind(), addr::rc_thin(&self.node))
	}
}
