use std::ops::Deref;
use std::rc::Rc;

use crate::{Error, Evaluation, Node, NodeRef};

pub struct Value<T> {
	value: Rc<dyn Access<T>>,
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			value: self.value.clone(),
		}
	}
}

impl<T> Value<T>
where
	T: 'static,
{
	pub fn new(value: Rc<dyn Access<T>>) -> Self {
		Value { value }
	}

	pub fn get<'a>(&'a self, cx: &'a impl AsRef<Evaluation>) -> Result<Ref<'a, T>, Error> {
		self.value.get(cx.as_ref())
	}

	pub fn get_once(&self) -> Result<Ref<'_, T>, Error> {
		self.value.get_once()
	}

	pub fn as_node(&self) -> NodeRef {
		NodeRef::new(self.value.clone().as_dyn_node())
	}
}

pub enum Ref<'a, T> {
	Ref(&'a T),
	Cell(std::cell::Ref<'a, T>),
}

impl<'a, T: std::fmt::Debug> std::fmt::Debug for Ref<'a, T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Ref::Ref(value) => std::fmt::Debug::fmt(value, f),
			Ref::Cell(guard) => std::fmt::Debug::fmt(&**guard, f),
		}
	}
}

impl<'a, T> Deref for Ref<'a, T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		match self {
			Ref::Cell(guard) => guard.deref(),
			Ref::Ref(value) => value,
		}
	}
}

pub trait Access<T>: Node {
	fn get<'a>(&'a self, eval: &'_ Evaluation) -> Result<Ref<'a, T>, Error>;
	fn get_once(&self) -> Result<Ref<'_, T>, Error>;
}
