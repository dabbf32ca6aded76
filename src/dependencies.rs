use std::rc::{Rc, Weak};

use fxhash::FxHashSet;
use smallvec::SmallVec;

use crate::addr;
use crate::{Consumer, Error, NodeRef, Producer};

#[derive(Clone, Default)]
pub struct Dependencies {
	records: SmallVec<[Record; 4]>,
}

#[derive(Clone)]
struct Record {
	source: Rc<dyn Producer>,
	stamp: u64,
}

impl Dependencies {
	pub(crate) fn new() -> Self {
		Dependencies {
			records: SmallVec::new(),
		}
	}

	pub(crate) fn record(&mut self, source: Rc<dyn Producer>, stamp: u64) {
		let key = addr::rc_thin(&source);
		if let Some(record) = self
			.records
			.iter_mut()
			.find(|record| addr::rc_thin(&record.source) == key)
		{
			record.stamp = stamp;
			return;
		}
		self.records.push(Record { source, stamp });
	}

	pub(crate) fn changed_since_read(&self) -> Result<bool, Error> {
		for record in &self.records {
			if record.source.refresh()? != record.stamp {
				return Ok(true);
			}
		}
		Ok(false)
	}

	// While the owner is live, back-edges move with the diff.
	pub(crate) fn swap(&mut self, next: Dependencies, owner: &Weak<dyn Consumer>, live: bool) {
		if live {
			let kept: FxHashSet<*const ()> = next
				.records
				.iter()
				.map(|record| addr::rc_thin(&record.source))
				.collect();
			for record in &self.records {
				if !kept.contains(&addr::rc_thin(&record.source)) {
					record.source.detach(owner);
				}
			}

			let had: FxHashSet<*const ()> = self
				.records
				.iter()
				.map(|record| addr::rc_thin(&record.source))
				.collect();
			for record in &next.records {
				if !had.contains(&addr::rc_thin(&record.source)) {
					record.source.attach(owner.clone());
				}
			}
		}
		self.records = next.records;
	}

	pub(crate) fn attach_all(&self, owner: &Weak<dyn Consumer>) {
		for record in &self.records {
			record.source.attach(owner.clone());
		}
	}

	pub(crate) fn detach_all(&self, owner: &Weak<dyn Consumer>) {
		for record in self.records.iter().rev() {
			record.source.detach(owner);
		}
	}

	pub(crate) fn sources(&self) -> Vec<NodeRef> {
		self.records
			.iter()
			.map(|record| NodeRef::new(record.source.clone().as_dyn_node()))
			.collect()
	}
}
