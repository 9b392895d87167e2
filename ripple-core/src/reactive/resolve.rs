//! Deep resolution of reactive values.
//!
//! [`Resolve`] turns a value that may contain reactive handles into the same
//! shape with every handle replaced by its current value. Containers are
//! rebuilt element by element. Reading a handle this way is an ordinary
//! tracked read, so resolving inside a computed makes every handle found a
//! dependency.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use super::computed::Computed;
use super::rx::{Nested, Payload, Read, Rx};
use super::signal::Signal;
use crate::error::Result;

/// A value whose reactive parts can be replaced by their current values.
pub trait Resolve {
    type Output;

    fn resolve(&self) -> Result<Self::Output>;
}

/// Implement [`Resolve`] for types with no reactive parts, by cloning.
#[macro_export]
macro_rules! impl_resolve_by_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::reactive::Resolve for $ty {
                type Output = $ty;

                fn resolve(&self) -> $crate::Result<$ty> {
                    Ok(::std::clone::Clone::clone(self))
                }
            }
        )*
    };
}

impl_resolve_by_clone!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, (),
    String, Arc<str>, Duration, &'static str,
);

/// Passes any clonable value through unchanged.
///
/// Use it for arguments that have no reactive parts and no [`Resolve`]
/// implementation of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Plain<T>(pub T);

impl<T: Clone> Resolve for Plain<T> {
    type Output = T;

    fn resolve(&self) -> Result<T> {
        Ok(self.0.clone())
    }
}

impl<T: Payload> Resolve for Signal<T> {
    type Output = T;

    fn resolve(&self) -> Result<T> {
        self.try_get()
    }
}

impl<T: Payload> Resolve for Computed<T> {
    type Output = T;

    fn resolve(&self) -> Result<T> {
        self.try_get()
    }
}

impl<T: Payload> Resolve for Rx<T> {
    type Output = T;

    fn resolve(&self) -> Result<T> {
        Read::try_get(self)
    }
}

impl<T: Payload> Resolve for Nested<T> {
    type Output = T;

    fn resolve(&self) -> Result<T> {
        Nested::resolve(self)
    }
}

impl<T: Resolve + ?Sized> Resolve for &T {
    type Output = T::Output;

    fn resolve(&self) -> Result<T::Output> {
        (**self).resolve()
    }
}

impl<T: Resolve + ?Sized> Resolve for Box<T> {
    type Output = T::Output;

    fn resolve(&self) -> Result<T::Output> {
        (**self).resolve()
    }
}

impl<T: Resolve + ?Sized> Resolve for Arc<T> {
    type Output = T::Output;

    fn resolve(&self) -> Result<T::Output> {
        (**self).resolve()
    }
}

impl<T: Resolve> Resolve for Option<T> {
    type Output = Option<T::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.as_ref().map(Resolve::resolve).transpose()
    }
}

impl<T: Resolve> Resolve for Vec<T> {
    type Output = Vec<T::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.iter().map(Resolve::resolve).collect()
    }
}

impl<T: Resolve> Resolve for VecDeque<T> {
    type Output = VecDeque<T::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.iter().map(Resolve::resolve).collect()
    }
}

impl<T: Resolve, const N: usize> Resolve for [T; N] {
    type Output = [T::Output; N];

    fn resolve(&self) -> Result<Self::Output> {
        let resolved: Vec<T::Output> = self.iter().map(Resolve::resolve).collect::<Result<_>>()?;
        match resolved.try_into() {
            Ok(array) => Ok(array),
            Err(_) => unreachable!("resolving preserves the array length"),
        }
    }
}

impl<K: Clone + Eq + Hash, V: Resolve> Resolve for HashMap<K, V> {
    type Output = HashMap<K, V::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.iter()
            .map(|(key, value)| Ok((key.clone(), value.resolve()?)))
            .collect()
    }
}

impl<K: Clone + Ord, V: Resolve> Resolve for BTreeMap<K, V> {
    type Output = BTreeMap<K, V::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.iter()
            .map(|(key, value)| Ok((key.clone(), value.resolve()?)))
            .collect()
    }
}

impl<T> Resolve for HashSet<T>
where
    T: Resolve,
    T::Output: Eq + Hash,
{
    type Output = HashSet<T::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.iter().map(Resolve::resolve).collect()
    }
}

impl<T> Resolve for BTreeSet<T>
where
    T: Resolve,
    T::Output: Ord,
{
    type Output = BTreeSet<T::Output>;

    fn resolve(&self) -> Result<Self::Output> {
        self.iter().map(Resolve::resolve).collect()
    }
}

macro_rules! impl_resolve_for_tuple {
    ($(($($name:ident : $idx:tt),+)),* $(,)?) => {
        $(
            impl<$($name: Resolve),+> Resolve for ($($name,)+) {
                type Output = ($($name::Output,)+);

                fn resolve(&self) -> Result<Self::Output> {
                    Ok(($(self.$idx.resolve()?,)+))
                }
            }
        )*
    };
}

impl_resolve_for_tuple!(
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
    (A: 0, B: 1, C: 2, D: 3, E: 4),
    (A: 0, B: 1, C: 2, D: 3, E: 4, F: 5),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveContext;
    use crate::graph::NodeId;

    #[test]
    fn scalars_pass_through() {
        assert_eq!(5.resolve().unwrap(), 5);
        assert_eq!("hi".to_string().resolve().unwrap(), "hi");
        assert_eq!(Plain(vec![1u8]).resolve().unwrap(), vec![1u8]);
    }

    #[test]
    fn containers_resolve_element_wise() {
        let a = Signal::new(1);
        let b = Signal::new(2);

        let list = vec![a.clone(), b.clone()];
        assert_eq!(list.resolve().unwrap(), vec![1, 2]);

        let array = [a.clone(), b.clone()];
        assert_eq!(array.resolve().unwrap(), [1, 2]);

        let map: BTreeMap<&str, Signal<i32>> = [("a", a.clone()), ("b", b.clone())].into();
        let resolved = map.resolve().unwrap();
        assert_eq!(resolved["b"], 2);

        let maybe = Some(a.clone());
        assert_eq!(maybe.resolve().unwrap(), Some(1));

        let nested = vec![Some(vec![b.clone()]), None];
        assert_eq!(nested.resolve().unwrap(), vec![Some(vec![2]), None]);
    }

    #[test]
    fn tuples_mix_plain_and_reactive() {
        let a = Signal::new(1);
        let doubled = Computed::new({
            let a = a.clone();
            move || a.get() * 2
        });

        let args = (a.clone(), doubled.clone(), Plain("x"));
        assert_eq!(args.resolve().unwrap(), (1, 2, "x"));
    }

    #[test]
    fn resolving_is_a_tracked_read() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let id = NodeId::new();

        let _ctx = ReactiveContext::enter(id);
        (a.clone(), vec![b.clone()]).resolve().unwrap();
        assert_eq!(ReactiveContext::dependency_ids(), vec![a.id(), b.id()]);
    }
}
