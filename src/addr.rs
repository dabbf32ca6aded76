use std::rc::{Rc, Weak};

// Node identity is the body address alone; vtable pointers differ
// between handles to the same body.

pub(crate) fn rc_thin<T: ?Sized>(ptr: &Rc<T>) -> *const () {
	Rc::as_ptr(ptr) as *const ()
}

pub(crate) fn weak_thin<T: ?Sized>(ptr: &Weak<T>) -> *const () {
	Weak::as_ptr(ptr) as *const ()
}
