//! Change detection.
//!
//! Before a node commits a new value it asks whether the value is actually
//! different from what it holds. Only a real change bumps the version and
//! reaches observers, which is what lets an unchanged intermediate value stop
//! a propagation early.
//!
//! # Rules
//!
//! [`differs`] applies, in order:
//!
//! 1. The very same value (same address, the same `Arc`, the same reactive
//!    node) never differs.
//! 2. Values of different runtime shape always differ: a plain value vs a
//!    reactive reference, or two [`Value`](super::Value) variants.
//! 3. [`Hashed`] values with different cached hashes differ without
//!    comparing contents.
//! 4. Otherwise the type's [`Change`] implementation decides. Containers
//!    compare element-wise, floats treat NaN as equal to NaN, and callables
//!    always differ.
//!
//! A comparison that panics is caught, logged, and counted as a change.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash, Hasher};
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

/// Decides whether a new value should propagate.
pub trait Change {
    /// Whether `self`, the incoming value, differs from `previous`.
    fn differs(&self, previous: &Self) -> bool;
}

/// Whether `current` differs from `previous` for propagation purposes.
///
/// Two references to the same address are never different. Distinct values
/// are compared through [`Change`]; a panic during that comparison counts as
/// a difference.
pub fn differs<T: Change + ?Sized>(previous: &T, current: &T) -> bool {
    if std::ptr::eq(previous, current) {
        return false;
    }
    match panic::catch_unwind(AssertUnwindSafe(|| current.differs(previous))) {
        Ok(differs) => differs,
        Err(_) => {
            warn!("equality check panicked; treating values as changed");
            true
        }
    }
}

/// Implement [`Change`] through `PartialEq`.
///
/// ```
/// use ripple_core::impl_change_by_eq;
///
/// #[derive(Clone, PartialEq)]
/// struct Point { x: i32, y: i32 }
///
/// impl_change_by_eq!(Point);
/// ```
#[macro_export]
macro_rules! impl_change_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::reactive::Change for $ty {
                fn differs(&self, previous: &Self) -> bool {
                    self != previous
                }
            }
        )*
    };
}

impl_change_by_eq!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, (), str,
    String, Duration,
);

impl_change_by_eq!(crate::graph::NodeId);

macro_rules! impl_change_for_float {
    ($($ty:ty),*) => {
        $(
            impl Change for $ty {
                fn differs(&self, previous: &Self) -> bool {
                    if self.is_nan() && previous.is_nan() {
                        return false;
                    }
                    self != previous
                }
            }
        )*
    };
}

impl_change_for_float!(f32, f64);

impl<T: Change + ?Sized> Change for &T {
    fn differs(&self, previous: &Self) -> bool {
        (**self).differs(*previous)
    }
}

impl<T: Change + ?Sized> Change for Box<T> {
    fn differs(&self, previous: &Self) -> bool {
        (**self).differs(&**previous)
    }
}

impl<T: Change + ?Sized> Change for Arc<T> {
    fn differs(&self, previous: &Self) -> bool {
        !Arc::ptr_eq(self, previous) && (**self).differs(&**previous)
    }
}

impl<T: Change + ?Sized> Change for Rc<T> {
    fn differs(&self, previous: &Self) -> bool {
        !Rc::ptr_eq(self, previous) && (**self).differs(&**previous)
    }
}

impl<T: Change> Change for Option<T> {
    fn differs(&self, previous: &Self) -> bool {
        match (self, previous) {
            (Some(current), Some(previous)) => current.differs(previous),
            (None, None) => false,
            _ => true,
        }
    }
}

impl<T: Change, E: Change> Change for Result<T, E> {
    fn differs(&self, previous: &Self) -> bool {
        match (self, previous) {
            (Ok(current), Ok(previous)) => current.differs(previous),
            (Err(current), Err(previous)) => current.differs(previous),
            _ => true,
        }
    }
}

impl<T: Change> Change for [T] {
    fn differs(&self, previous: &Self) -> bool {
        self.len() != previous.len()
            || self.iter().zip(previous).any(|(a, b)| a.differs(b))
    }
}

impl<T: Change, const N: usize> Change for [T; N] {
    fn differs(&self, previous: &Self) -> bool {
        self.as_slice().differs(previous.as_slice())
    }
}

impl<T: Change> Change for Vec<T> {
    fn differs(&self, previous: &Self) -> bool {
        self.as_slice().differs(previous.as_slice())
    }
}

impl<T: Change> Change for VecDeque<T> {
    fn differs(&self, previous: &Self) -> bool {
        self.len() != previous.len()
            || self.iter().zip(previous).any(|(a, b)| a.differs(b))
    }
}

impl<K, V, S> Change for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Change,
    S: BuildHasher,
{
    fn differs(&self, previous: &Self) -> bool {
        self.len() != previous.len()
            || self.iter().any(|(key, value)| match previous.get(key) {
                Some(old) => value.differs(old),
                None => true,
            })
    }
}

impl<K: Ord, V: Change> Change for BTreeMap<K, V> {
    fn differs(&self, previous: &Self) -> bool {
        self.len() != previous.len()
            || self
                .iter()
                .zip(previous)
                .any(|((k1, v1), (k2, v2))| k1 != k2 || v1.differs(v2))
    }
}

impl<T: Eq + Hash, S: BuildHasher> Change for HashSet<T, S> {
    fn differs(&self, previous: &Self) -> bool {
        self != previous
    }
}

impl<T: Ord> Change for BTreeSet<T> {
    fn differs(&self, previous: &Self) -> bool {
        self != previous
    }
}

macro_rules! impl_change_for_tuple {
    ($(($($name:ident : $idx:tt),+)),* $(,)?) => {
        $(
            impl<$($name: Change),+> Change for ($($name,)+) {
                fn differs(&self, previous: &Self) -> bool {
                    $(self.$idx.differs(&previous.$idx))||+
                }
            }
        )*
    };
}

impl_change_for_tuple!(
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
    (A: 0, B: 1, C: 2, D: 3, E: 4),
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5),
);

/// A value carrying a precomputed hash.
///
/// Two `Hashed` values with different hashes differ without their contents
/// being compared, which makes change detection on large values cheap when
/// they really did change.
#[derive(Debug, Clone)]
pub struct Hashed<T> {
    value: T,
    hash: u64,
}

impl<T: Hash> Hashed<T> {
    pub fn new(value: T) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        value.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            value,
        }
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Hashed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Change> Change for Hashed<T> {
    fn differs(&self, previous: &Self) -> bool {
        self.hash != previous.hash || self.value.differs(&previous.value)
    }
}
