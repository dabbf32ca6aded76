use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use crate::context;
use crate::evaluation::Evaluation;
use crate::options::Options;
use crate::propagate::{Propagation, Sinks};
use crate::value::{Access, Ref, Value};
use crate::{Computed, Consumer, Error, Mark, Node, NodeKind, NodeRef, Producer, Status};

pub struct State<T> {
	body: Rc<StateBody<T>>,
}

pub struct StateBody<T> {
	value: RefCell<T>,
	stamp: Cell<u64>,
	sinks: RefCell<Sinks>,
	options: Options<T>,
	this: Weak<StateBody<T>>,
}

impl<T> Clone for State<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for State<T>
where
	T: Default + PartialEq + 'static,
{
	fn default() -> Self {
		State::new(Default::default())
	}
}

impl<T> State<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self
	where
		T: PartialEq,
	{
		Self::with_options(value, Options::default())
	}

	pub fn with_options(value: T, options: Options<T>) -> Self {
		State {
			body: Rc::new_cyclic(|this| StateBody {
				value: RefCell::new(value),
				stamp: Cell::new(context::bump_clock()),
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

	#[inline]
	pub fn set(&self, value: T) -> Result<(), Error> {
		self.body.set(value)
	}

	#[inline]
	pub fn replace(&self, value: T) -> Result<T, Error> {
		self.body.replace(value)
	}

	pub fn sinks(&self) -> Vec<NodeRef> {
		self.body.sinks.borrow().nodes()
	}

	pub fn as_node(&self) -> NodeRef {
		NodeRef::new(self.body.clone() as Rc<dyn Node>)
	}
}

impl<T> StateBody<T>
where
	T: 'static,
{
	pub fn get<'a>(&'a self, eval: &'_ Evaluation) -> Result<Ref<'a, T>, Error> {
		if context::in_notification() {
			return Err(Error::NotificationPhase);
		}
		if let Some(this) = self.this.upgrade() {
			eval.record(this, self.stamp.get());
		}
		Ok(Ref::Cell(self.value.borrow()))
	}

	pub fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		if context::in_notification() {
			return Err(Error::NotificationPhase);
		}
		Ok(Ref::Cell(self.value.borrow()))
	}

	pub fn set(&self, next: T) -> Result<(), Error> {
		if context::in_notification() {
			return Err(Error::NotificationPhase);
		}
		if (self.options.eq)(&*self.value.borrow(), &next) {
			return Ok(());
		}
		*self.value.borrow_mut() = next;
		self.stamp.set(context::bump_clock());
		self.propagate()
	}

	// The swap is unconditional; propagation stays gated on inequality.
	pub fn replace(&self, next: T) -> Result<T, Error> {
		if context::in_notification() {
			return Err(Error::NotificationPhase);
		}
		let equal = (self.options.eq)(&*self.value.borrow(), &next);
		let prev = std::mem::replace(&mut *self.value.borrow_mut(), next);
		if equal {
			return Ok(prev);
		}
		self.stamp.set(context::bump_clock());
		self.propagate()?;
		Ok(prev)
	}

	fn propagate(&self) -> Result<(), Error> {
		tracing::trace!(stamp = self.stamp.get(), "state changed");
		let mut run = Propagation::new();
		let direct = self.sinks.borrow_mut().collect();
		for sink in direct {
			sink.mark(Mark::Dirty, &mut run);
		}
		run.deliver()
	}

	fn hook(&self, hook: &Option<Rc<dyn Fn()>>) {
		if let Some(hook) = hook.clone() {
			hook()
		}
	}
}

impl<T> Node for StateBody<T>
where
	T: 'static,
{
	fn kind(&self) -> NodeKind {
		NodeKind::State
	}

	fn sources(&self) -> Vec<NodeRef> {
		Vec::new()
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

impl<T> Producer for StateBody<T>
where
	T: 'static,
{
	fn refresh(&self) -> Result<u64, Error> {
		Ok(self.stamp.get())
	}

	fn stamp(&self) -> u64 {
		self.stamp.get()
	}

	fn status(&self) -> Status {
		Status::Clean
	}

	fn attach(&self, sink: Weak<dyn Consumer>) {
		let promoted = {
			let mut sinks = self.sinks.borrow_mut();
			let was_live = sinks.is_live();
			sinks.insert(sink);
			!was_live && sinks.is_live()
		};
		if promoted {
			tracing::debug!("state watched");
			self.hook(&self.options.on_watched);
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
			tracing::debug!("state unwatched");
			self.hook(&self.options.on_unwatched);
		}
	}
}

impl<T> Access<T> for StateBody<T>
where
	T: 'static,
{
	fn get<'a>(&'a self, eval: &'_ Evaluation) -> Result<Ref<'a, T>, Error> {
		StateBody::get(self, eval)
	}

	fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		StateBody::get_once(self)
	}
}

impl<T> From<State<T>> for Value<T>
where
	T: 'static,
{
	fn from(state: State<T>) -> Self {
		Value::new(state.body)
	}
}

impl<T> Debug for State<T>
where
	T: 'static + Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.body.value.borrow().fmt(f)
	}
}
