use std::cell::{Cell, RefCell};
use std::rc::Rc;

use filament::{
	computed, current_computed, Computed, Const, Error, EvalError, NodeRef, Options, State, Value,
	Watcher,
};

mod mock;

use mock::Spy;

#[test]
fn computed_chain() {
	let a = State::new(10);
	assert_eq!(*a.get_once().unwrap(), 10);

	let b = Computed::new(Box::new({
		let a = a.clone();
		move |cx| Ok(*a.get(cx)? + 10)
	}));

	assert_eq!(*b.get_once().unwrap(), 20);

	a.set(20).unwrap();
	assert_eq!(*b.get_once().unwrap(), 30);

	a.set(20).unwrap();
	assert_eq!(*b.get_once().unwrap(), 30);
}

#[test]
fn parity_counter() {
	let counter = State::new(0);

	let even_runs = Rc::new(Cell::new(0));
	let is_even = Computed::new(Box::new({
		let counter = counter.clone();
		let runs = even_runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Ok((*counter.get(cx)? & 1) == 0)
		}
	}));

	let parity_runs = Rc::new(Cell::new(0));
	let parity = Computed::new(Box::new({
		let is_even = is_even.clone();
		let runs = parity_runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Ok(if *is_even.get(cx)? { "even" } else { "odd" })
		}
	}));

	assert_eq!(*parity.get_once().unwrap(), "even");
	assert_eq!((even_runs.get(), parity_runs.get()), (1, 1));

	// 0 -> 2: still even, so the parity callback must not run again.
	counter.set(2).unwrap();
	assert_eq!(*parity.get_once().unwrap(), "even");
	assert_eq!((even_runs.get(), parity_runs.get()), (2, 1));

	counter.set(3).unwrap();
	assert_eq!(*parity.get_once().unwrap(), "odd");
	assert_eq!((even_runs.get(), parity_runs.get()), (3, 2));
}

#[test]
fn conditional_dependency() {
	let a = State::new(true);
	let b = State::new(1);
	let c = State::new(2);

	let runs = Rc::new(Cell::new(0));
	let d = Computed::new(Box::new({
		let (a, b, c) = (a.clone(), b.clone(), c.clone());
		let runs = runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Ok(if *a.get(cx)? {
				*b.get(cx)?
			} else {
				*c.get(cx)?
			})
		}
	}));

	assert_eq!(*d.get_once().unwrap(), 1);
	assert_eq!(d.sources(), vec![a.as_node(), b.as_node()]);

	// `c` is not currently a source.
	c.set(99).unwrap();
	assert_eq!(*d.get_once().unwrap(), 1);
	assert_eq!(runs.get(), 1);

	a.set(false).unwrap();
	assert_eq!(*d.get_once().unwrap(), 99);
	assert_eq!(d.sources(), vec![a.as_node(), c.as_node()]);

	// And now `b` no longer is.
	b.set(42).unwrap();
	assert_eq!(*d.get_once().unwrap(), 99);
	assert_eq!(runs.get(), 2);
}

#[test]
fn error_caching() {
	let s = State::new("first".to_string());

	let runs = Rc::new(Cell::new(0));
	let c: Computed<i32> = Computed::new(Box::new({
		let s = s.clone();
		let runs = runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Err(EvalError::msg(&*s.get(cx)?))
		}
	}));

	let err = c.get_once().unwrap_err();
	assert_eq!(err.to_string(), "first");
	assert_eq!(runs.get(), 1);

	// The error is cached: no re-evaluation until a source changes.
	assert_eq!(c.get_once().unwrap_err().to_string(), "first");
	assert_eq!(runs.get(), 1);

	s.set("second".to_string()).unwrap();
	assert_eq!(c.get_once().unwrap_err().to_string(), "second");
	assert_eq!(runs.get(), 2);
}

#[test]
fn error_recovery() {
	let s = State::new(-1);
	let c = Computed::new(Box::new({
		let s = s.clone();
		move |cx| {
			let v = *s.get(cx)?;
			if v < 0 {
				return Err(EvalError::msg("negative"));
			}
			Ok(v * 2)
		}
	}));

	assert_eq!(c.get_once().unwrap_err().to_string(), "negative");
	s.set(4).unwrap();
	assert_eq!(*c.get_once().unwrap(), 8);
}

#[test]
fn watcher_notification() {
	let s = State::new(1);
	let mock = mock::SharedMock::new();

	let w = Watcher::new(Box::new({
		let mock = mock.clone();
		move || {
			mock.get().notify();
			Ok(())
		}
	}));
	w.watch([s.as_node()]).unwrap();

	mock.get().expect_notify().times(1).return_const(());
	s.set(2).unwrap();
	mock.get().checkpoint();

	assert_eq!(w.pending(), vec![s.as_node()]);

	// Not re-armed: further changes stay silent.
	mock.get().expect_notify().times(0).return_const(());
	s.set(5).unwrap();
	mock.get().checkpoint();

	w.watch([]).unwrap();
	assert_eq!(w.pending(), Vec::<NodeRef>::new());

	// A write that does not change the value never notifies.
	mock.get().expect_notify().times(0).return_const(());
	s.set(5).unwrap();
	mock.get().checkpoint();

	mock.get().expect_notify().times(1).return_const(());
	s.set(6).unwrap();
	mock.get().checkpoint();
}

#[test]
fn watcher_pending_computed() {
	let s = State::new(1);
	let c = Computed::new(Box::new({
		let s = s.clone();
		move |cx| Ok(*s.get(cx)? + 1)
	}));

	let w = Watcher::new(Box::new(|| Ok(())));
	w.watch([c.as_node()]).unwrap();
	assert_eq!(*c.get_once().unwrap(), 2);
	w.watch([]).unwrap();
	assert_eq!(w.pending(), Vec::<NodeRef>::new());

	s.set(7).unwrap();
	assert_eq!(w.pending(), vec![c.as_node()]);

	// Reading settles the status, but the value still differs from the
	// armed baseline until the watcher is re-armed.
	assert_eq!(*c.get_once().unwrap(), 8);
	assert_eq!(w.pending(), vec![c.as_node()]);

	w.watch([]).unwrap();
	assert_eq!(w.pending(), Vec::<NodeRef>::new());
}

#[test]
fn pruning() {
	let s = State::new(0);

	let c1_runs = Rc::new(Cell::new(0));
	let c1 = Computed::new(Box::new({
		let s = s.clone();
		let runs = c1_runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			s.get(cx)?;
			Ok(1)
		}
	}));

	let c2_runs = Rc::new(Cell::new(0));
	let c2 = Computed::new(Box::new({
		let c1 = c1.clone();
		let runs = c2_runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Ok(*c1.get(cx)? + 1)
		}
	}));

	assert_eq!(*c2.get_once().unwrap(), 2);
	assert_eq!((c1_runs.get(), c2_runs.get()), (1, 1));

	// `c1` recomputes to an equal value, so `c2` is pruned.
	s.set(1).unwrap();
	assert_eq!(*c2.get_once().unwrap(), 2);
	assert_eq!((c1_runs.get(), c2_runs.get()), (2, 1));
}

#[test]
fn liveness_hooks() {
	let log = Rc::new(RefCell::new(Vec::new()));
	let push = |log: &Rc<RefCell<Vec<&'static str>>>, entry: &'static str| {
		let log = log.clone();
		move || log.borrow_mut().push(entry)
	};

	let s = State::with_options(
		1,
		Options::default()
			.with_on_watched(push(&log, "s-watched"))
			.with_on_unwatched(push(&log, "s-unwatched")),
	);
	let c = Computed::with_options(
		Box::new({
			let s = s.clone();
			move |cx| Ok(*s.get(cx)?)
		}),
		Options::default()
			.with_on_watched(push(&log, "c-watched"))
			.with_on_unwatched(push(&log, "c-unwatched")),
	);

	// A plain read keeps everything lazy: no hooks fire.
	assert_eq!(*c.get_once().unwrap(), 1);
	assert!(log.borrow().is_empty());

	let w = Watcher::new(Box::new(|| Ok(())));
	w.watch([c.as_node()]).unwrap();
	assert_eq!(*log.borrow(), vec!["c-watched", "s-watched"]);

	w.unwatch([c.as_node()]).unwrap();
	assert_eq!(
		*log.borrow(),
		vec!["c-watched", "s-watched", "c-unwatched", "s-unwatched"]
	);

	// Hooks alternate 1:1 across repeated transitions.
	w.watch([c.as_node()]).unwrap();
	w.unwatch([c.as_node()]).unwrap();
	assert_eq!(log.borrow().len(), 8);
}

#[test]
fn liveness_back_edges() {
	let s = State::new(1);
	let c = Computed::new(Box::new({
		let s = s.clone();
		move |cx| Ok(*s.get(cx)?)
	}));

	assert_eq!(*c.get_once().unwrap(), 1);
	assert!(!s.as_node().has_sinks());
	assert!(c.as_node().has_sources());

	let w = Watcher::new(Box::new(|| Ok(())));
	w.watch([c.as_node()]).unwrap();
	assert_eq!(s.sinks(), vec![c.as_node()]);
	assert_eq!(c.sinks(), vec![w.as_node()]);

	w.unwatch([c.as_node()]).unwrap();
	assert!(!s.as_node().has_sinks());
	assert!(!c.as_node().has_sinks());
}

#[test]
fn watcher_drop_detaches() {
	let unwatched = Rc::new(Cell::new(0));
	let s = State::with_options(
		1,
		Options::default().with_on_unwatched({
			let unwatched = unwatched.clone();
			move || unwatched.set(unwatched.get() + 1)
		}),
	);

	let w = Watcher::new(Box::new(|| Ok(())));
	w.watch([s.as_node()]).unwrap();
	assert!(s.as_node().has_sinks());

	drop(w);
	assert_eq!(unwatched.get(), 1);
	assert!(!s.as_node().has_sinks());
}

#[test]
fn cycle_detection() {
	let holder: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
	let flag = State::new(true);

	let a = Computed::new(Box::new({
		let holder = holder.clone();
		let flag = flag.clone();
		move |cx| {
			if *flag.get(cx)? {
				let b = holder.borrow().clone().unwrap();
				let v = *b.get(cx)? + 1;
				Ok(v)
			} else {
				Ok(1)
			}
		}
	}));
	let b = Computed::new(Box::new({
		let a = a.clone();
		move |cx| Ok(*a.get(cx)? * 2)
	}));
	*holder.borrow_mut() = Some(b.clone());

	assert!(matches!(a.get_once().unwrap_err(), Error::Cycle));

	// Not cached: the next read attempts the evaluation again.
	assert!(matches!(a.get_once().unwrap_err(), Error::Cycle));

	// Breaking the cycle recovers both nodes.
	flag.set(false).unwrap();
	assert_eq!(*a.get_once().unwrap(), 1);
	assert_eq!(*b.get_once().unwrap(), 2);
}

#[test]
fn self_cycle() {
	let holder: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
	let c = Computed::new(Box::new({
		let holder = holder.clone();
		move |cx| {
			let this = holder.borrow().clone().unwrap();
			let v = *this.get(cx)?;
			Ok(v)
		}
	}));
	*holder.borrow_mut() = Some(c.clone());

	assert!(matches!(c.get_once().unwrap_err(), Error::Cycle));
	assert!(c.sources().is_empty());
}

#[test]
fn untracked_reads() {
	let a = State::new(1);
	let b = State::new(10);

	let c = Computed::new(Box::new({
		let (a, b) = (a.clone(), b.clone());
		move |cx| {
			let base = *a.get(cx)?;
			let hidden = cx.untrack(|| b.get(cx).map(|v| *v))?;
			Ok(base + hidden)
		}
	}));

	assert_eq!(*c.get_once().unwrap(), 11);
	assert_eq!(c.sources(), vec![a.as_node()]);

	// `b` is not a source; its writes do not invalidate `c`.
	b.set(20).unwrap();
	assert_eq!(*c.get_once().unwrap(), 11);

	a.set(2).unwrap();
	assert_eq!(*c.get_once().unwrap(), 22);
}

#[test]
fn current_computed_introspection() {
	let seen = Rc::new(RefCell::new(None));
	let c = Computed::new(Box::new({
		let seen = seen.clone();
		move |_cx| {
			*seen.borrow_mut() = current_computed();
			Ok(0)
		}
	}));

	assert!(current_computed().is_none());
	c.get_once().unwrap();
	assert_eq!(seen.borrow().clone().unwrap(), c.as_node());
	assert!(current_computed().is_none());
}

#[test]
fn duplicate_reads_collapse() {
	let a = State::new(1);
	let c = Computed::new(Box::new({
		let a = a.clone();
		move |cx| Ok(*a.get(cx)? + *a.get(cx)?)
	}));

	assert_eq!(*c.get_once().unwrap(), 2);
	assert_eq!(c.sources(), vec![a.as_node()]);
}

#[test]
fn notification_phase_lockout() {
	let s = State::new(1);
	let c = Computed::new(Box::new({
		let s = s.clone();
		move |cx| Ok(*s.get(cx)?)
	}));
	assert_eq!(*c.get_once().unwrap(), 1);

	let ran = Rc::new(Cell::new(false));
	let w = Watcher::new(Box::new({
		let (s, c) = (s.clone(), c.clone());
		let ran = ran.clone();
		move || {
			assert!(matches!(
				s.get_once().unwrap_err(),
				Error::NotificationPhase
			));
			assert!(matches!(s.set(9).unwrap_err(), Error::NotificationPhase));
			assert!(matches!(
				c.get_once().unwrap_err(),
				Error::NotificationPhase
			));
			ran.set(true);
			Ok(())
		}
	}));
	w.watch([s.as_node()]).unwrap();

	s.set(2).unwrap();
	assert!(ran.get());

	// The blocked accesses left the graph intact.
	assert_eq!(*s.get_once().unwrap(), 2);
	assert_eq!(*c.get_once().unwrap(), 2);
}

#[test]
fn watcher_ops_allowed_during_notification() {
	let s = State::new(1);
	let holder: Rc<RefCell<Option<Watcher>>> = Rc::new(RefCell::new(None));
	let pending_len = Rc::new(Cell::new(0));

	let w = Watcher::new(Box::new({
		let holder = holder.clone();
		let pending_len = pending_len.clone();
		move || {
			let w = holder.borrow().clone().unwrap();
			pending_len.set(w.pending().len());
			Ok(())
		}
	}));
	*holder.borrow_mut() = Some(w.clone());
	w.watch([s.as_node()]).unwrap();

	s.set(2).unwrap();
	assert_eq!(pending_len.get(), 1);
}

#[test]
fn notify_failure_surfaces_from_set() {
	let s = State::new(1);
	let w = Watcher::new(Box::new(|| Err(EvalError::msg("boom"))));
	w.watch([s.as_node()]).unwrap();

	let err = s.set(2).unwrap_err();
	assert!(matches!(err, Error::Eval(_)));
	assert_eq!(err.to_string(), "boom");

	// The write itself happened and propagation completed.
	assert_eq!(*s.get_once().unwrap(), 2);
	assert_eq!(w.pending(), vec![s.as_node()]);
}

#[test]
fn notify_failures_aggregate() {
	let s = State::new(1);
	let w1 = Watcher::new(Box::new(|| Err(EvalError::msg("first"))));
	let w2 = Watcher::new(Box::new(|| Err(EvalError::msg("second"))));
	let survived = Rc::new(Cell::new(false));
	let w3 = Watcher::new(Box::new({
		let survived = survived.clone();
		move || {
			survived.set(true);
			Ok(())
		}
	}));
	w1.watch([s.as_node()]).unwrap();
	w2.watch([s.as_node()]).unwrap();
	w3.watch([s.as_node()]).unwrap();

	match s.set(2).unwrap_err() {
		Error::Aggregate(errors) => {
			assert_eq!(errors.len(), 2);
			assert_eq!(errors[0].to_string(), "first");
			assert_eq!(errors[1].to_string(), "second");
		}
		other => panic!("expected aggregate, got {other:?}"),
	}

	// Every callback ran before the failures were surfaced.
	assert!(survived.get());
}

#[test]
fn watch_rejects_non_signals() {
	let s = State::new(1);
	let w = Watcher::new(Box::new(|| Ok(())));
	let other = Watcher::new(Box::new(|| Ok(())));

	assert!(matches!(
		w.watch([other.as_node()]).unwrap_err(),
		Error::NotASignal
	));
	assert!(matches!(
		w.unwatch([other.as_node()]).unwrap_err(),
		Error::NotASignal
	));

	// The failed call touched nothing.
	assert!(w.sources().is_empty());

	// Unwatching a signal that was never watched is a no-op.
	w.unwatch([s.as_node()]).unwrap();
	assert!(w.sources().is_empty());
}

#[test]
fn write_during_evaluation() {
	let s = State::new(0);
	let c = Computed::new(Box::new({
		let s = s.clone();
		move |cx| {
			let v = *s.get(cx)?;
			if v < 3 {
				s.set(v + 1)?;
			}
			Ok(v)
		}
	}));

	// Each evaluation observes the value it started from and leaves the
	// node stale; reads converge once the writes stop.
	assert_eq!(*c.get_once().unwrap(), 0);
	assert_eq!(*c.get_once().unwrap(), 1);
	assert_eq!(*c.get_once().unwrap(), 2);
	assert_eq!(*c.get_once().unwrap(), 3);
	assert_eq!(*c.get_once().unwrap(), 3);
	assert_eq!(*s.get_once().unwrap(), 3);
}

#[test]
fn custom_equality() {
	let s = State::with_options(10, Options::<i32>::default().with_eq(|a, b| a % 3 == b % 3));

	let runs = Rc::new(Cell::new(0));
	let c = Computed::new(Box::new({
		let s = s.clone();
		let runs = runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Ok(*s.get(cx)?)
		}
	}));

	assert_eq!(*c.get_once().unwrap(), 10);

	// 13 ≡ 10 (mod 3): the write is discarded entirely.
	s.set(13).unwrap();
	assert_eq!(*s.get_once().unwrap(), 10);
	assert_eq!(*c.get_once().unwrap(), 10);
	assert_eq!(runs.get(), 1);

	s.set(11).unwrap();
	assert_eq!(*c.get_once().unwrap(), 11);
	assert_eq!(runs.get(), 2);
}

#[test]
fn replace_returns_previous() {
	let s = State::with_options(10, Options::<i32>::default().with_eq(|a, b| a % 3 == b % 3));

	let runs = Rc::new(Cell::new(0));
	let c = Computed::new(Box::new({
		let s = s.clone();
		let runs = runs.clone();
		move |cx| {
			runs.set(runs.get() + 1);
			Ok(*s.get(cx)?)
		}
	}));
	assert_eq!(*c.get_once().unwrap(), 10);

	let notified = Rc::new(Cell::new(0));
	let w = Watcher::new(Box::new({
		let notified = notified.clone();
		move || {
			notified.set(notified.get() + 1);
			Ok(())
		}
	}));
	w.watch([s.as_node()]).unwrap();

	// 13 ≡ 10 (mod 3): the swap still happens and the old value comes
	// back, but nothing propagates.
	assert_eq!(s.replace(13).unwrap(), 10);
	assert_eq!(*s.get_once().unwrap(), 13);
	assert_eq!(*c.get_once().unwrap(), 10);
	assert_eq!(runs.get(), 1);
	assert_eq!(notified.get(), 0);

	// An unequal replacement propagates like `set`.
	assert_eq!(s.replace(5).unwrap(), 13);
	assert_eq!(*c.get_once().unwrap(), 5);
	assert_eq!(runs.get(), 2);
	assert_eq!(notified.get(), 1);
}

#[test]
fn values_and_const() {
	let s = State::new(2);
	let double = s.map(|v| v * 2);
	let k = Const::new(100);

	assert_eq!(*k.get(), 100);

	let dv: Value<i32> = double.clone().into();
	let kv: Value<i32> = k.clone().into();
	assert_eq!(*dv.get_once().unwrap(), 4);
	assert_eq!(*kv.get_once().unwrap(), 100);

	s.set(5).unwrap();
	assert_eq!(*dv.get_once().unwrap(), 10);

	// Reading a const records no dependency.
	let c = Computed::new(Box::new({
		let kv = kv.clone();
		move |cx| Ok(*kv.get(cx)?)
	}));
	assert_eq!(*c.get_once().unwrap(), 100);
	assert!(c.sources().is_empty());
}

#[test]
fn computed_macro() {
	let a = State::new(1);
	let b = State::new(2);

	let sum = computed!((a, b) cx => *a.get(cx)? + *b.get(cx)?);
	assert_eq!(*sum.get_once().unwrap(), 3);

	a.set(10).unwrap();
	assert_eq!(*sum.get_once().unwrap(), 12);

	let doubled = computed!(cx => *sum.get(cx)? * 2);
	assert_eq!(*doubled.get_once().unwrap(), 24);
}

#[test]
fn map_chain() {
	let s = State::new("graph".to_string());
	let len = s.map(|v| v.len());
	let wide = len.map(|v| *v > 4);

	assert_eq!(*wide.get_once().unwrap(), true);
	s.set("dag".to_string()).unwrap();
	assert_eq!(*wide.get_once().unwrap(), false);
}
