pub use enclose::*;

/// Build a [`Computed`](crate::Computed) from an expression body, with an
/// optional enclose-style capture list. The body yields the value; `?`
/// works on node reads.
#[macro_export]
macro_rules! computed {
	(( $($d_tt:tt)* ) $cx:ident => $($b:tt)*) => {
		$crate::Computed::new($crate::macros::enclose!(($( $d_tt )*) Box::new(move |$cx: &$crate::Evaluation| { Ok({ $($b)* }) })))
	};
	($cx:ident => $($b:tt)*) => {
		$crate::Computed::new(Box::new(move |$cx: &$crate::Evaluation| { Ok({ $($b)* }) }))
	};
}
