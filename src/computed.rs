use std::cell;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::context;
use crate::dependencies::Dependencies;
use crate::error::{Error, EvalError};
use crate::evaluation::Evaluation;
use crate::options::Options;
use crate::propagate::{Propagation, Sinks};
use crate::value::{Access, Ref, Value};
use crate::{Consumer, Mark, Node, NodeKind, NodeRef, Producer, Status};

pub struct Computed<T> {
	body: Rc<ComputedBody<T>>,
}

impl<T> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

type Callback<T> = Box<dyn Fn(&Evaluation) -> Result<T, EvalError>>;

pub struct ComputedBody<T> {
	func: Callback<T>,
	value: RefCell<Slot<T>>,
	stamp: Cell<u64>,
	status: Cell<Status>,
	computing: Cell<bool>,
	redirtied: Cell<bool>,
	verified_at: Cell<u64>,
	deps: RefCell<Dependencies>,
	sinks: RefCell<Sinks>,
	options: Options<T>,
	this: Weak<ComputedBody<T>>,
}

enum Slot<T> {
	Empty,
	Ok(T),
	Err(EvalError),
}

impl<T> Computed<T>
where
	T: 'static,
{
	pub fn new(func: Callback<T>) -> Self
	where
		T: PartialEq,
	{
		Self::with_options(func, Options::default())
	}

	pub fn with_options(func: Callback<T>, options: Options<T>) -> Self {
		Computed {
			body: Rc::new_cyclic(|this| ComputedBody {
				func,
				value: RefCell::new(Slot::Empty),
				stamp: Cell::new(0),
				status: Cell::new(Status::Dirty),
				computing: Cell::new(false),
				redirtied: Cell::new(false),
				verified_at: Cell::new(0),
				deps: RefCell::new(Dependencies::new()),
				sinks: RefCell::new(Sinks::new()),
				options,
				this: this.clone(),
			}),
		}
	}

	pub fn map<F, R>(&self, func: F) -> Computed<R>
	where
		F: Fn(&T) -> R + 'static,
		R: PartialEq + 'static,
	{
		let this = self.body.clone();
		Computed::new(Box::new(move |cx| Ok(func(&*this.get(cx)?))))
	}

	#[inline]
	pub fn get<'a>(&'a self, cx: &'a impl AsRef<Evaluation>) -> Result<Ref<'a, T>, Error> {
		self.body.get(cx.as_ref())
	}

	#[inline]
	pub fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		self.body.get_once()
	}

	pub fn sources(&self) -> Vec<NodeRef> {
		self.body.deps.borrow().sources()
	}

	pub fn sinks(&self) -> Vec<NodeRef> {
		self.body.sinks.borrow().nodes()
	}

	pub fn as_node(&self) -> NodeRef {
		NodeRef::new(self.body.clone() as Rc<dyn Node>)
	}
}

impl<T> ComputedBody<T>
where
	T: 'static,
{
	pub fn get<'a>(&'a self, eval: &'_ Evaluation) -> Result<Ref<'a, T>, Error> {
		if context::in_notification() {
			return Err(Error::NotificationPhase);
		}
		self.refresh()?;
		if let Some(this) = self.this.upgrade() {
			eval.record(this, self.stamp.get());
		}
		self.read_slot()
	}

	pub fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		if context::in_notification() {
			return Err(Error::NotificationPhase);
		}
		self.refresh()?;
		self.read_slot()
	}

	fn read_slot(&self) -> Result<Ref<'_, T>, Error> {
		match cell::Ref::filter_map(self.value.borrow(), |slot| match slot {
			Slot::Ok(value) => Some(value),
			_ => None,
		}) {
			Ok(value) => Ok(Ref::Cell(value)),
			Err(slot) => match &*slot {
				Slot::Err(err) => Err(Error::Eval(err.clone())),
				// `refresh` fills the slot before `read_slot` runs.
				Slot::Ok(_) | Slot::Empty => unreachable!("refresh settles the slot"),
			},
		}
	}

	// Settles the node (verified clean, recomputed, or cached error);
	// only a cycle leaves without settling.
	fn refresh(&self) -> Result<u64, Error> {
		if self.computing.get() {
			return Err(Error::Cycle);
		}

		let live = self.sinks.borrow().is_live();
		let (verify, recompute) = if live {
			match self.status.get() {
				Status::Dirty => (false, true),
				Status::Checked => (true, false),
				Status::Clean => (false, false),
			}
		} else if matches!(&*self.value.borrow(), Slot::Empty) {
			(false, true)
		} else if self.verified_at.get() == context::clock() {
			// Nothing anywhere has changed since this node was last
			// settled.
			(false, false)
		} else {
			(true, false)
		};

		if !verify && !recompute {
			return Ok(self.stamp.get());
		}

		struct Busy<'a>(&'a Cell<bool>);
		impl Drop for Busy<'_> {
			fn drop(&mut self) {
				self.0.set(false);
			}
		}
		self.computing.set(true);
		let _busy = Busy(&self.computing);

		self.redirtied.set(false);
		let started_at = context::clock();

		let mut must_recompute = recompute;
		if verify {
			let snapshot = self.deps.borrow().clone();
			must_recompute = snapshot.changed_since_read()? || self.redirtied.get();
			if must_recompute {
				self.status.set(Status::Dirty);
			}
		}

		if must_recompute {
			self.recompute(started_at)?;
		} else {
			self.status.set(Status::Clean);
			self.verified_at.set(started_at);
		}

		Ok(self.stamp.get())
	}

	fn recompute(&self, started_at: u64) -> Result<(), Error> {
		tracing::trace!("recomputing");

		let eval = Evaluation::new();
		let result = {
			let _scope = context::enter_evaluation(self.this.clone() as Weak<dyn Node>);
			(self.func)(&eval)
		};

		if let Err(err) = &result {
			if err.is_cycle() {
				// Discard the partial capture; the next read re-attempts
				// from the old edges.
				self.status.set(Status::Dirty);
				return Err(Error::Cycle);
			}
		}

		let live = self.sinks.borrow().is_live();
		let owner = self.this.clone() as Weak<dyn Consumer>;
		let mut deps = std::mem::take(&mut *self.deps.borrow_mut());
		deps.swap(eval.take(), &owner, live);
		*self.deps.borrow_mut() = deps;

		let changed = match (&*self.value.borrow(), &result) {
			// Errors never compare equal, neither to values nor to other
			// errors.
			(Slot::Ok(prev), Ok(next)) => !(self.options.eq)(prev, next),
			_ => true,
		};

		let wrote_during = context::clock() != started_at;

		*self.value.borrow_mut() = match result {
			Ok(value) => Slot::Ok(value),
			Err(err) => Slot::Err(err),
		};
		if changed {
			self.stamp.set(context::bump_clock());
		}

		if self.redirtied.get() {
			// A write landed while the callback was running; the next
			// read must recompute.
			self.redirtied.set(false);
			self.status.set(Status::Dirty);
		} else {
			self.status.set(Status::Clean);
			self.verified_at
				.set(if wrote_during { started_at } else { context::clock() });
		}

		Ok(())
	}

	fn hook(&self, hook: &Option<Rc<dyn Fn()>>) {
		if let Some(hook) = hook.clone() {
			hook()
		}
	}
}

impl<T> Node for ComputedBody<T>
where
	T: 'static,
{
	fn kind(&self) -> NodeKind {
		NodeKind::Computed
	}

	fn sources(&self) -> Vec<NodeRef> {
		self.deps.borrow().sources()
	}

	fn sinks(&self) -> Vec<NodeRef> {
		self.sinks.borrow().nodes()
	}

	fn as_producer(self: Rc<Self>) -> Option<Rc<dyn Producer>> {
		Some(self)
	}

	fn as_dyn_node(self: Rc<Self>) -> Rc<dyn Node> {
		self
	}
}

impl<T> Producer for ComputedBody<T>
where
	T: 'static,
{
	fn refresh(&self) -> Result<u64, Error> {
		ComputedBody::refresh(self)
	}

	fn stamp(&self) -> u64 {
		self.stamp.get()
	}

	fn status(&self) -> Status {
		self.status.get()
	}

	fn attach(&self, sink: Weak<dyn Consumer>) {
		let promoted = {
			let mut sinks = self.sinks.borrow_mut();
			let was_live = sinks.is_live();
			sinks.insert(sink);
			!was_live && sinks.is_live()
		};
		if promoted {
			tracing::debug!("computed promoted to live");
			// A lazy-mode verification may predate this promotion.
			if self.status.get() == Status::Clean && self.verified_at.get() != context::clock() {
				self.status.set(Status::Checked);
			}
			self.hook(&self.options.on_watched);
			let deps = self.deps.borrow().clone();
			deps.attach_all(&(self.this.clone() as Weak<dyn Consumer>));
		}
	}

	fn detach(&self, sink: &Weak<dyn Consumer>) {
		let demoted = {
			let mut sinks = self.sinks.borrow_mut();
			let was_live = sinks.is_live();
			sinks.remove(sink);
			was_live && !sinks.is_live()
		};
		if demoted {
			tracing::debug!("computed demoted from live");
			if self.status.get() == Status::Clean {
				self.verified_at.set(context::clock());
			}
			self.hook(&self.options.on_unwatched);
			let deps = self.deps.borrow().clone();
			deps.detach_all(&(self.this.clone() as Weak<dyn Consumer>));
		}
	}
}

impl<T> Consumer for ComputedBody<T>
where
	T: 'static,
{
	fn mark(self: Rc<Self>, mark: Mark, run: &mut Propagation) {
		if self.computing.get() {
			self.redirtied.set(true);
		}
		let forward = match self.status.get() {
			Status::Clean => {
				self.status.set(match mark {
					Mark::Dirty => Status::Dirty,
					Mark::Checked => Status::Checked,
				});
				true
			}
			// Already stained; sinks were stained when this node first
			// left clean.
			Status::Checked | Status::Dirty => false,
		};
		if forward {
			let sinks = self.sinks.borrow_mut().collect();
			for sink in sinks {
				sink.mark(Mark::Checked, run);
			}
		}
	}

	fn as_sink_node(self: Rc<Self>) -> Rc<dyn Node> {
		self
	}
}

impl<T> Access<T> for ComputedBody<T>
where
	T: 'static,
{
	fn get<'a>(&'a self, eval: &'_ Evaluation) -> Result<Ref<'a, T>, Error> {
		ComputedBody::get(self, eval)
	}

	fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		ComputedBody::get_once(self)
	}
}

impl<T> From<Computed<T>> for Value<T>
where
	T: 'static,
{
	fn from(computed: Computed<T>) -> Self {
		Value::new(computed.body)
	}
}
