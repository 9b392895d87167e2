//! Operators over reactive handles.
//!
//! Arithmetic, bitwise and comparison operators on handles build a new
//! [`Computed`], as do the collection helpers on [`RxExt`]:
//!
//! ```rust
//! use ripple_core::reactive::{RxExt, Signal};
//!
//! let price = Signal::new(4);
//! let quantity = Signal::new(3);
//!
//! let total = &price * &quantity;
//! let expensive = total.gt(10);
//!
//! assert_eq!(total.get(), 12);
//! assert!(expensive.get());
//!
//! quantity.set(2);
//! assert!(!expensive.get());
//! ```
//!
//! Nothing here is special: every operator is a small producing function
//! wrapped in [`Computed::try_new`], so caching, version skips and dependency
//! switching work exactly as for hand-written computeds.

use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

use super::computed::Computed;
use super::resolve::{Plain, Resolve};
use super::rx::{Payload, Read, Rx};
use super::signal::Signal;
use crate::error::Error;

/// Something usable as the operand of a reactive operator.
///
/// Implemented for handles (owned or borrowed) and for plain values.
pub trait IntoOperand<T> {
    type Operand: Resolve<Output = T> + Send + Sync + 'static;

    fn into_operand(self) -> Self::Operand;
}

impl<T: Payload> IntoOperand<T> for T {
    type Operand = Plain<T>;

    fn into_operand(self) -> Plain<T> {
        Plain(self)
    }
}

macro_rules! impl_operand_for_handle {
    ($($handle:ident),*) => {
        $(
            impl<T: Payload> IntoOperand<T> for $handle<T> {
                type Operand = $handle<T>;

                fn into_operand(self) -> $handle<T> {
                    self
                }
            }

            impl<T: Payload> IntoOperand<T> for &$handle<T> {
                type Operand = $handle<T>;

                fn into_operand(self) -> $handle<T> {
                    self.clone()
                }
            }
        )*
    };
}

impl_operand_for_handle!(Signal, Computed, Rx);

fn combine<A, B, R, F>(lhs: A, rhs: B, f: F) -> Computed<R>
where
    A: Resolve + Send + Sync + 'static,
    B: Resolve + Send + Sync + 'static,
    R: Payload,
    F: Fn(A::Output, B::Output) -> R + Send + Sync + 'static,
{
    Computed::try_new(move || Ok::<R, Error>(f(lhs.resolve()?, rhs.resolve()?)))
}

fn apply<A, R, F>(operand: A, f: F) -> Computed<R>
where
    A: Resolve + Send + Sync + 'static,
    R: Payload,
    F: Fn(A::Output) -> R + Send + Sync + 'static,
{
    Computed::try_new(move || operand.resolve().map(&f))
}

macro_rules! impl_binary_ops {
    ($handle:ident: $($op:ident :: $method:ident),*) => {
        $(
            impl<T, Rhs> $op<Rhs> for &$handle<T>
            where
                T: Payload + $op<Output = T>,
                Rhs: IntoOperand<T>,
            {
                type Output = Computed<T>;

                fn $method(self, rhs: Rhs) -> Computed<T> {
                    combine(self.clone(), rhs.into_operand(), |a: T, b: T| $op::$method(a, b))
                }
            }

            impl<T, Rhs> $op<Rhs> for $handle<T>
            where
                T: Payload + $op<Output = T>,
                Rhs: IntoOperand<T>,
            {
                type Output = Computed<T>;

                fn $method(self, rhs: Rhs) -> Computed<T> {
                    combine(self, rhs.into_operand(), |a: T, b: T| $op::$method(a, b))
                }
            }
        )*
    };
}

macro_rules! impl_unary_ops {
    ($handle:ident: $($op:ident :: $method:ident),*) => {
        $(
            impl<T> $op for &$handle<T>
            where
                T: Payload + $op<Output = T>,
            {
                type Output = Computed<T>;

                fn $method(self) -> Computed<T> {
                    apply(self.clone(), |value: T| $op::$method(value))
                }
            }

            impl<T> $op for $handle<T>
            where
                T: Payload + $op<Output = T>,
            {
                type Output = Computed<T>;

                fn $method(self) -> Computed<T> {
                    apply(self, |value: T| $op::$method(value))
                }
            }
        )*
    };
}

impl_binary_ops!(Signal: Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem);
impl_binary_ops!(Computed: Add::add, Sub::sub, Mul::mul, Div::div, Rem::rem);
impl_binary_ops!(Signal: BitAnd::bitand, BitOr::bitor, BitXor::bitxor, Shl::shl, Shr::shr);
impl_binary_ops!(Computed: BitAnd::bitand, BitOr::bitor, BitXor::bitxor, Shl::shl, Shr::shr);
impl_unary_ops!(Signal: Neg::neg, Not::not);
impl_unary_ops!(Computed: Neg::neg, Not::not);

/// Derived values built from any readable handle.
pub trait RxExt<T: Payload>: Read<T> + Resolve<Output = T> + Clone + Sized {
    /// Apply `f` to the value.
    fn map<R, F>(&self, f: F) -> Computed<R>
    where
        R: Payload,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        apply(self.clone(), f)
    }

    /// Pass the value through unchanged, calling `f` with it on every
    /// evaluation.
    fn tap<F>(&self, f: F) -> Computed<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        apply(self.clone(), move |value: T| {
            f(&value);
            value
        })
    }

    fn eq<O: IntoOperand<T>>(&self, other: O) -> Computed<bool>
    where
        T: PartialEq,
    {
        combine(self.clone(), other.into_operand(), |a: T, b: T| a == b)
    }

    fn ne<O: IntoOperand<T>>(&self, other: O) -> Computed<bool>
    where
        T: PartialEq,
    {
        combine(self.clone(), other.into_operand(), |a: T, b: T| a != b)
    }

    fn lt<O: IntoOperand<T>>(&self, other: O) -> Computed<bool>
    where
        T: PartialOrd,
    {
        combine(self.clone(), other.into_operand(), |a: T, b: T| a < b)
    }

    fn le<O: IntoOperand<T>>(&self, other: O) -> Computed<bool>
    where
        T: PartialOrd,
    {
        combine(self.clone(), other.into_operand(), |a: T, b: T| a <= b)
    }

    fn gt<O: IntoOperand<T>>(&self, other: O) -> Computed<bool>
    where
        T: PartialOrd,
    {
        combine(self.clone(), other.into_operand(), |a: T, b: T| a > b)
    }

    fn ge<O: IntoOperand<T>>(&self, other: O) -> Computed<bool>
    where
        T: PartialOrd,
    {
        combine(self.clone(), other.into_operand(), |a: T, b: T| a >= b)
    }

    /// Absolute value, for any signed type with a zero `Default`.
    fn abs(&self) -> Computed<T>
    where
        T: PartialOrd + Default + Neg<Output = T>,
    {
        apply(self.clone(), |value: T| {
            if value < T::default() {
                -value
            } else {
                value
            }
        })
    }

    /// Number of elements in a collection value.
    fn len(&self) -> Computed<usize>
    where
        T: IntoIterator,
    {
        apply(self.clone(), |value: T| value.into_iter().count())
    }

    /// Whether a collection value holds `item`.
    fn contains<E, O>(&self, item: O) -> Computed<bool>
    where
        T: IntoIterator<Item = E>,
        E: Payload + PartialEq,
        O: IntoOperand<E>,
    {
        combine(self.clone(), item.into_operand(), |all: T, item: E| {
            all.into_iter().any(|candidate| candidate == item)
        })
    }

    /// The element at `index`, or `None` past the end.
    ///
    /// The index may itself be reactive.
    fn item<E, I>(&self, index: I) -> Computed<Option<E>>
    where
        T: IntoIterator<Item = E>,
        E: Payload,
        I: IntoOperand<usize>,
    {
        combine(self.clone(), index.into_operand(), |all: T, index: usize| {
            all.into_iter().nth(index)
        })
    }

    /// The elements of a collection value that satisfy `keep`.
    fn filter<E, F>(&self, keep: F) -> Computed<Vec<E>>
    where
        T: IntoIterator<Item = E>,
        E: Payload,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        apply(self.clone(), move |all: T| all.into_iter().filter(|e| keep(e)).collect())
    }

    /// Fold a collection value into one, starting from `init`.
    fn reduce<E, A, F>(&self, init: A, fold: F) -> Computed<A>
    where
        T: IntoIterator<Item = E>,
        A: Payload,
        F: Fn(A, E) -> A + Send + Sync + 'static,
    {
        apply(self.clone(), move |all: T| all.into_iter().fold(init.clone(), &fold))
    }
}

impl<T: Payload, H> RxExt<T> for H where H: Read<T> + Resolve<Output = T> + Clone {}

/// Choose between two values on a condition.
///
/// Only the chosen branch is read, so the computed depends on the condition
/// and one branch at a time.
pub fn select<T, C, A, B>(condition: C, if_true: A, if_false: B) -> Computed<T>
where
    T: Payload,
    C: IntoOperand<bool>,
    A: IntoOperand<T>,
    B: IntoOperand<T>,
{
    let condition = condition.into_operand();
    let if_true = if_true.into_operand();
    let if_false = if_false.into_operand();

    Computed::try_new(move || {
        if condition.resolve()? {
            if_true.resolve()
        } else {
            if_false.resolve()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn arithmetic_builds_computeds() {
        let a = Signal::new(6);
        let b = Signal::new(4);

        let sum = &a + &b;
        let scaled = &sum * 10;
        let rest = &a % 4;
        let negated = -&b;

        assert_eq!(sum.get(), 10);
        assert_eq!(scaled.get(), 100);
        assert_eq!(rest.get(), 2);
        assert_eq!(negated.get(), -4);

        b.set(1);
        assert_eq!(scaled.get(), 70);
        assert_eq!(negated.get(), -1);
    }

    #[test]
    fn owned_handles_and_not() {
        let flag = Signal::new(true);
        let inverted = !flag.clone();
        assert!(!inverted.get());

        flag.set(false);
        assert!(inverted.get());

        let x = Signal::new(2.5);
        let half = x.clone() / 2.0;
        assert_eq!(half.get(), 1.25);
    }

    #[test]
    fn comparisons() {
        let n = Signal::new(3);
        let limit = Signal::new(5);

        let below = n.lt(&limit);
        let same = n.eq(3);
        let at_least = n.ge(limit.clone());

        assert!(below.get());
        assert!(same.get());
        assert!(!at_least.get());

        n.set(5);
        assert!(!below.get());
        assert!(!same.get());
        assert!(at_least.get());
    }

    #[test]
    fn map_and_tap() {
        let name = Signal::new(String::from("ripple"));
        let length = name.map(|s: String| s.len());
        assert_eq!(length.get(), 6);

        let taps = Arc::new(AtomicI32::new(0));
        let tapped = {
            let taps = taps.clone();
            length.tap(move |_| {
                taps.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(tapped.get(), 6);
        assert_eq!(tapped.get(), 6);
        assert_eq!(taps.load(Ordering::SeqCst), 1);

        name.set(String::from("waves"));
        assert_eq!(tapped.get(), 5);
        assert_eq!(taps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn bitwise_and_shifts() {
        let mask = Signal::new(0b1100);
        let bits = Signal::new(0b1010);

        let both = &mask & &bits;
        let either = &mask | &bits;
        let toggled = &mask ^ 0b1111;
        let shifted = &bits << 2;
        let halved = bits.clone() >> 1;

        assert_eq!(both.get(), 0b1000);
        assert_eq!(either.get(), 0b1110);
        assert_eq!(toggled.get(), 0b0011);
        assert_eq!(shifted.get(), 0b101000);
        assert_eq!(halved.get(), 0b0101);

        let on = Signal::new(true);
        let gated = &on & false;
        assert!(!gated.get());
    }

    #[test]
    fn collection_helpers() {
        let readings = Signal::new(vec![3, -7, 12, 0]);
        let wanted = Signal::new(12);
        let position = Signal::new(1usize);

        let count = readings.len();
        let has_wanted = readings.contains(&wanted);
        let picked = readings.item(&position);
        let positive = readings.filter(|n: &i32| *n > 0);
        let total = readings.reduce(0, |sum: i32, n: i32| sum + n);

        assert_eq!(count.get(), 4);
        assert!(has_wanted.get());
        assert_eq!(picked.get(), Some(-7));
        assert_eq!(positive.get(), vec![3, 12]);
        assert_eq!(total.get(), 8);

        wanted.set(5);
        position.set(9);
        readings.set(vec![5]);
        assert_eq!(count.get(), 1);
        assert!(has_wanted.get());
        assert_eq!(picked.get(), None);
        assert_eq!(total.get(), 5);
    }

    #[test]
    fn abs_of_signed_values() {
        let delta = Signal::new(-4);
        let magnitude = delta.abs();
        assert_eq!(magnitude.get(), 4);

        delta.set(9);
        assert_eq!(magnitude.get(), 9);

        let drift = Signal::new(-0.5);
        assert_eq!(drift.abs().get(), 0.5);
    }

    #[test]
    fn select_reads_only_the_taken_branch() {
        let use_left = Signal::new(true);
        let left = Signal::new(1);
        let right = Signal::new(2);

        let chosen: Computed<i32> = select(&use_left, &left, &right);
        assert_eq!(chosen.get(), 1);
        assert_eq!(chosen.dependency_ids(), vec![use_left.id(), left.id()]);
        assert_eq!(right.observer_count(), 0);

        use_left.set(false);
        assert_eq!(chosen.get(), 2);
        assert_eq!(left.observer_count(), 0);
        assert_eq!(right.observer_count(), 1);
    }
}
