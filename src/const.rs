use std::rc::{Rc, Weak};

use crate::evaluation::Evaluation;
use crate::value::{Access, Ref, Value};
use crate::{Consumer, Error, Node, NodeKind, NodeRef, Producer, Status};

pub struct Const<T> {
	body: Rc<ConstBody<T>>,
}

struct ConstBody<T> {
	value: T,
}

impl<T> Clone for Const<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl<T> Const<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self {
		Const {
			body: Rc::new(ConstBody { value }),
		}
	}

	pub fn get(&self) -> &T {
		&self.body.value
	}

	pub fn as_node(&self) -> NodeRef {
		NodeRef::new(self.body.clone() as Rc<dyn Node>)
	}
}

impl<T> Node for ConstBody<T>
where
	T: 'static,
{
	fn kind(&self) -> NodeKind {
		NodeKind::Const
	}

	fn sources(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	fn sinks(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	fn as_producer(self: Rc<Self>) -> Option<Rc<dyn Producer>> {
		Some(self)
	}

	fn as_dyn_node(self: Rc<Self>) -> Rc<dyn Node> {
		self
	}
}

impl<T> Producer for ConstBody<T>
where
	T: 'static,
{
	fn refresh(&self) -> Result<u64, Error> {
		Ok(0)
	}

	fn stamp(&self) -> u64 {
		0
	}

	fn status(&self) -> Status {
		Status::Clean
	}

	fn attach(&self, _: Weak<dyn Consumer>) {}

	fn detach(&self, _: &Weak<dyn Consumer>) {}
}

impl<T> Access<T> for ConstBody<T>
where
	T: 'static,
{
	fn get<'a>(&'a self, _: &'_ Evaluation) -> Result<Ref<'a, T>, Error> {
		Ok(Ref::Ref(&self.value))
	}

	fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		Ok(Ref::Ref(&self.value))
	}
}

impl<T> From<Const<T>> for Value<T>
where
	T: 'static,
{
	fn from(value: Const<T>) -> Self {
		Value::new(value.body)
	}
}
