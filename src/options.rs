use std::rc::Rc;

/// Per-node equality predicate and liveness hooks.
pub struct Options<T> {
	pub eq: Rc<dyn Fn(&T, &T) -> bool>,
	pub on_watched: Option<Rc<dyn Fn()>>,
	pub on_unwatched: Option<Rc<dyn Fn()>>,
}

impl<T> Options<T> {
	pub fn with_eq(mut self, eq: impl Fn(&T, &T) -> bool + 'static) -> Self {
		self.eq = Rc::new(eq);
		self
	}

	pub fn with_on_watched(mut self, hook: impl Fn() + 'static) -> Self {
		self.on_watched = Some(Rc::new(hook));
		self
	}

	pub fn with_on_unwatched(mut self, hook: impl Fn() + 'static) -> Self {
		self.on_unwatched = Some(Rc::new(hook));
		self
	}
}

impl<T: PartialEq> Default for Options<T> {
	fn default() -> Self {
		Options {
			eq: Rc::new(|prev: &T, next: &T| prev == next),
			on_watched: None,
			on_unwatched: None,
		}
	}
}

impl<T> Clone for Options<T> {
	fn clone(&self) -> Self {
		Options {
			eq: self.eq.clone(),
			on_watched: self.on_watched.clone(),
			on_unwatched: self.on_unwatched.clone(),
		}
	}
}
