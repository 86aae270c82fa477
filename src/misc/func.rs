use std::cmp::Ordering;
use std::fmt::Debug;

/// Pass a strictly positive, finite value through; clamp an exact zero.
///
/// Normal and subnormal positive values are returned unchanged. Zero
/// (of either sign) becomes `f64::MIN_POSITIVE`, the smallest positive
/// normal `f64`. Infinite, NaN, and negative values have no sensible
/// positive substitute and yield `None`.
///
/// # Example
///
/// ```rust
/// # use pmm::misc::finite_positive;
/// assert_eq!(finite_positive(2.5), Some(2.5));
/// assert_eq!(finite_positive(0.0), Some(f64::MIN_POSITIVE));
/// assert_eq!(finite_positive(f64::NAN), None);
/// assert_eq!(finite_positive(f64::INFINITY), None);
/// ```
pub fn finite_positive(x: f64) -> Option<f64> {
    if x == 0.0 {
        Some(f64::MIN_POSITIVE)
    } else if x.is_finite() && x > 0.0 {
        Some(x)
    } else {
        None
    }
}

/// A vector of `k` equal weights summing to one
///
/// # Example
///
/// ```rust
/// # use pmm::misc::uniform_weights;
/// assert_eq!(uniform_weights(4), vec![0.25; 4]);
/// ```
pub fn uniform_weights(k: usize) -> Vec<f64> {
    vec![(k as f64).recip(); k]
}

/// Lexicographic comparison of two equal-length parameter vectors.
///
/// Entries are compared left to right; the first differing entry decides.
/// Entries that do not compare (NaN) are treated as equal.
///
/// # Example
///
/// ```rust
/// # use pmm::misc::cmp_lex;
/// use std::cmp::Ordering;
///
/// assert_eq!(cmp_lex(&[1.0, 5.0], &[1.0, 2.0]), Ordering::Greater);
/// assert_eq!(cmp_lex(&[0.5, 9.0], &[1.0, 0.0]), Ordering::Less);
/// assert_eq!(cmp_lex(&[1.0, 2.0], &[1.0, 2.0]), Ordering::Equal);
/// ```
pub fn cmp_lex(xs: &[f64], ys: &[f64]) -> Ordering {
    xs.iter()
        .zip(ys.iter())
        .map(|(x, y)| x.partial_cmp(y).unwrap_or(Ordering::Equal))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Convert a Vector to a printable string
///
/// # Example
///
/// ```rust
/// # use pmm::misc::vec_to_string;
/// let xs: Vec<u8> = vec![0, 1, 2, 3, 4, 5];
///
/// assert_eq!(vec_to_string(&xs, 6).as_str(), "[0, 1, 2, 3, 4, 5]");
/// assert_eq!(vec_to_string(&xs, 5).as_str(), "[0, 1, 2, 3, ... , 5]");
///
/// ```
pub fn vec_to_string<T: Debug>(xs: &[T], max_entries: usize) -> String {
    let mut out = String::new();
    out += "[";
    let n = xs.len();
    xs.iter().enumerate().for_each(|(i, x)| {
        let to_push = if i < max_entries - 1 && i < n - 1 {
            format!("{:?}, ", x)
        } else if i == (max_entries - 1) && n > max_entries {
            String::from("... , ")
        } else if i == n - 1 {
            format!("{:?}]", x)
        } else {
            String::new()
        };

        out.push_str(to_push.as_str());
    });

    if n == 0 {
        out.push(']');
    }

    out
}
