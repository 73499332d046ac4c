//! Alignment constants and overflow-checked size arithmetic.
//!
//! Every internal structure of the heap (area headers, block headers and
//! footers) is aligned to [`BASE_ALIGN`], and every block size is a multiple
//! of it. Because `BASE_ALIGN` is even, the lowest bit of any pointer to such
//! a structure is always zero and can carry a flag (see
//! [`tagged`](crate::tagged)).

/// Alignment of every pointer returned by `malloc` and of every internal
/// structure.
///
/// It is at least the alignment of the strictest scalar type of the target.
pub const BASE_ALIGN: usize = 16;

const _: () = assert!(BASE_ALIGN.is_power_of_two());
const _: () = assert!(BASE_ALIGN >= 2);
const _: () = assert!(BASE_ALIGN >= align_of::<u128>());
const _: () = assert!(BASE_ALIGN >= align_of::<f64>());
const _: () = assert!(BASE_ALIGN >= align_of::<usize>());

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` does not need to be a power of two. Returns `None` on overflow.
///
/// # Panics
///
/// Panics if `align` is zero.
///
/// # Examples
///
/// ```
/// use heap::align::checked_align_up;
///
/// assert_eq!(checked_align_up(13, 16), Some(16));
/// assert_eq!(checked_align_up(32, 16), Some(32));
/// assert_eq!(checked_align_up(7, 3), Some(9));
/// assert_eq!(checked_align_up(usize::MAX, 16), None);
/// ```
#[must_use]
pub const fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    assert!(align > 0, "alignment must be greater than zero");
    value.checked_next_multiple_of(align)
}

/// Rounds `value` up to [`BASE_ALIGN`], or `None` on overflow.
#[must_use]
pub const fn checked_align_base(value: usize) -> Option<usize> {
    checked_align_up(value, BASE_ALIGN)
}

/// Rounds a `const` size up to [`BASE_ALIGN`].
///
/// Only meant for sizes of internal structures, which cannot overflow.
pub(crate) const fn align_base(value: usize) -> usize {
    match checked_align_base(value) {
        Some(value) => value,
        None => panic!("structure size overflowed"),
    }
}

/// Greatest common divisor of `a` and `b`.
const fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Least common multiple of `a` and `b`, or `None` on overflow.
///
/// Both values must be non-zero.
///
/// # Examples
///
/// ```
/// use heap::align::checked_lcm;
///
/// assert_eq!(checked_lcm(16, 16), Some(16));
/// assert_eq!(checked_lcm(24, 16), Some(48));
/// assert_eq!(checked_lcm(usize::MAX, 16), None);
/// ```
#[must_use]
pub const fn checked_lcm(a: usize, b: usize) -> Option<usize> {
    assert!(a > 0 && b > 0, "lcm operands must be non-zero");
    (a / gcd(a, b)).checked_mul(b)
}

/// Computes the alignment actually used to place a payload.
///
/// An alignment of zero means "no particular alignment" and is mapped to
/// [`BASE_ALIGN`]. Any other value, power of two or not, is combined with
/// `BASE_ALIGN` so the result satisfies both.
#[must_use]
pub const fn total_alignment(align: usize) -> Option<usize> {
    if align == 0 {
        return Some(BASE_ALIGN);
    }
    checked_lcm(align, BASE_ALIGN)
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        for i in 0..10 {
            for value in (BASE_ALIGN * i + 1)..=(BASE_ALIGN * (i + 1)) {
                assert_eq!(checked_align_base(value), Some(BASE_ALIGN * (i + 1)));
            }
        }
        assert_eq!(checked_align_base(0), Some(0));
        assert_eq!(checked_align_up(10, 6), Some(12));
        assert_eq!(checked_align_up(usize::MAX - 1, 2), Some(usize::MAX - 1));
        assert_eq!(checked_align_up(usize::MAX, 2), None);
    }

    #[test]
    fn test_lcm() {
        assert_eq!(checked_lcm(1, 16), Some(16));
        assert_eq!(checked_lcm(3, 16), Some(48));
        assert_eq!(checked_lcm(64, 16), Some(64));
        assert_eq!(checked_lcm(12, 18), Some(36));
        assert_eq!(checked_lcm(usize::MAX / 2, 16), None);
    }

    #[test]
    fn test_total_alignment() {
        assert_eq!(total_alignment(0), Some(BASE_ALIGN));
        assert_eq!(total_alignment(1), Some(BASE_ALIGN));
        assert_eq!(total_alignment(8), Some(BASE_ALIGN));
        assert_eq!(total_alignment(4096), Some(4096));
        assert_eq!(total_alignment(24), Some(48));
        assert_eq!(total_alignment(usize::MAX), None);
    }
}
