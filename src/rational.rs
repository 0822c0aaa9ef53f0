//! Exact fractions over 64-bit integers.
//!
//! Every value is kept in lowest terms with a positive denominator, and zero
//! is always `0/1`, so the derived `PartialEq` and `Hash` compare by value.
//! Intermediate products are computed in `i128` and only narrowed back after
//! reduction.
//!
//! The `std::ops` operators behave like the integer operators: they panic on
//! overflow or division by zero. Code that must keep running (the simplex and
//! the accumulator) uses the `checked_*` methods instead.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, Sub, SubAssign};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RationalError;

static LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?)(\d*)(?:\.(\d*))?(?:\s*/\s*(\d+))?$").expect("literal pattern is valid")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };
    pub const MINUS_ONE: Rational = Rational { num: -1, den: 1 };

    /// Builds `numerator / denominator` in lowest terms.
    ///
    /// ```
    /// use planit::rational::Rational;
    ///
    /// let half = Rational::new(-3, -6).unwrap();
    /// assert_eq!(half, Rational::new(1, 2).unwrap());
    /// assert_eq!(Rational::new(0, 7).unwrap().denominator(), 1);
    /// assert!(Rational::new(1, 0).is_err());
    /// ```
    pub fn new(numerator: i64, denominator: i64) -> Result<Self, RationalError> {
        Self::from_i128(numerator as i128, denominator as i128)
    }

    pub const fn from_integer(value: i64) -> Self {
        Rational { num: value, den: 1 }
    }

    fn from_i128(numerator: i128, denominator: i128) -> Result<Self, RationalError> {
        if denominator == 0 {
            return Err(RationalError::DivideByZero);
        }
        if numerator == 0 {
            return Ok(Self::ZERO);
        }
        let (mut n, mut d) = (numerator, denominator);
        if d < 0 {
            n = -n;
            d = -d;
        }
        let g = gcd(n, d);
        // i64::MIN has no negation, so the numerator range is kept symmetric
        let num = i64::try_from(n / g)
            .ok()
            .filter(|&num| num != i64::MIN)
            .ok_or(RationalError::Overflow)?;
        let den = i64::try_from(d / g).map_err(|_| RationalError::Overflow)?;
        Ok(Rational { num, den })
    }

    pub fn numerator(&self) -> i64 {
        self.num
    }

    pub fn denominator(&self) -> i64 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_positive(&self) -> bool {
        self.num > 0
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn signum(&self) -> i64 {
        self.num.signum()
    }

    /// Panics on `i64::MIN`, like `i64::abs`.
    pub fn abs(&self) -> Self {
        unwrap_op(self.checked_abs(), "take the absolute value of")
    }

    pub fn checked_abs(&self) -> Result<Self, RationalError> {
        self.num
            .checked_abs()
            .map(|num| Rational { num, den: self.den })
            .ok_or(RationalError::Overflow)
    }

    /// `1 / self`; zero has no reciprocal.
    pub fn recip(&self) -> Result<Self, RationalError> {
        Self::from_i128(self.den as i128, self.num as i128)
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, RationalError> {
        let n = self.num as i128 * rhs.den as i128 + rhs.num as i128 * self.den as i128;
        Self::from_i128(n, self.den as i128 * rhs.den as i128)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, RationalError> {
        let n = self.num as i128 * rhs.den as i128 - rhs.num as i128 * self.den as i128;
        Self::from_i128(n, self.den as i128 * rhs.den as i128)
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, RationalError> {
        Self::from_i128(
            self.num as i128 * rhs.num as i128,
            self.den as i128 * rhs.den as i128,
        )
    }

    pub fn checked_div(self, rhs: Self) -> Result<Self, RationalError> {
        Self::from_i128(
            self.num as i128 * rhs.den as i128,
            self.den as i128 * rhs.num as i128,
        )
    }

    /// Remainder of truncating division; the sign follows `self`.
    pub fn checked_rem(self, rhs: Self) -> Result<Self, RationalError> {
        let l = self.num as i128 * rhs.den as i128;
        let r = self.den as i128 * rhs.num as i128;
        if r == 0 {
            return Err(RationalError::DivideByZero);
        }
        Self::from_i128(l % r, self.den as i128 * rhs.den as i128)
    }

    pub fn checked_neg(self) -> Result<Self, RationalError> {
        self.num
            .checked_neg()
            .map(|num| Rational { num, den: self.den })
            .ok_or(RationalError::Overflow)
    }

    /// Lossy conversion, only for display and rough comparisons.
    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

impl From<i32> for Rational {
    fn from(value: i32) -> Self {
        Self::from_integer(value as i64)
    }
}

impl From<u32> for Rational {
    fn from(value: u32) -> Self {
        Self::from_integer(value as i64)
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Denominators are positive, so cross multiplication keeps the order.
        let l = self.num as i128 * other.den as i128;
        let r = other.num as i128 * self.den as i128;
        l.cmp(&r)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn unwrap_op(result: Result<Rational, RationalError>, op: &str) -> Rational {
    match result {
        Ok(value) => value,
        Err(err) => panic!("attempt to {op} rationals failed: {err}"),
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Self) -> Self::Output {
        unwrap_op(self.checked_add(rhs), "add")
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Self) -> Self::Output {
        unwrap_op(self.checked_sub(rhs), "subtract")
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Self) -> Self::Output {
        unwrap_op(self.checked_mul(rhs), "multiply")
    }
}

impl Div for Rational {
    type Output = Rational;

    fn div(self, rhs: Self) -> Self::Output {
        unwrap_op(self.checked_div(rhs), "divide")
    }
}

impl Rem for Rational {
    type Output = Rational;

    fn rem(self, rhs: Self) -> Self::Output {
        unwrap_op(self.checked_rem(rhs), "take the remainder of")
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        unwrap_op(self.checked_neg(), "negate")
    }
}

impl AddAssign for Rational {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Rational {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Rational {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Rational {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl std::iter::Sum for Rational {
    fn sum<I: Iterator<Item = Rational>>(iter: I) -> Self {
        iter.fold(Rational::ZERO, |acc, x| acc + x)
    }
}

/// `n/d` (or `n` for integers); with a precision, a rounded decimal.
impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(precision) = f.precision() {
            return write!(f, "{:.*}", precision, self.to_f64());
        }
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// Parses integers, fractions and exact decimals: `"3"`, `"-3/4"`,
/// `"0.888"`, `"1.5/2"`.
impl FromStr for Rational {
    type Err = RationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RationalError::Parse(s.to_string());
        let caps = LITERAL.captures(s.trim()).ok_or_else(invalid)?;

        let whole = caps.get(2).map_or("", |m| m.as_str());
        let fraction = caps.get(3).map_or("", |m| m.as_str());
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let parse = |digits: &str| -> Result<i128, RationalError> {
            if digits.is_empty() {
                Ok(0)
            } else {
                digits.parse::<i128>().map_err(|_| RationalError::Overflow)
            }
        };

        let scale = 10i128
            .checked_pow(fraction.len() as u32)
            .ok_or(RationalError::Overflow)?;
        let mut numerator = parse(whole)?
            .checked_mul(scale)
            .and_then(|n| n.checked_add(parse(fraction).ok()?))
            .ok_or(RationalError::Overflow)?;
        if &caps[1] == "-" {
            numerator = -numerator;
        }

        let mut denominator = scale;
        if let Some(divisor) = caps.get(4) {
            denominator = denominator
                .checked_mul(parse(divisor.as_str())?)
                .ok_or(RationalError::Overflow)?;
        }

        Rational::from_i128(numerator, denominator)
    }
}

impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct RationalVisitor;

impl<'de> Visitor<'de> for RationalVisitor {
    type Value = Rational;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a rational literal such as \"3/2\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Rational::new(v, 1).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(Rational::from_integer)
            .map_err(|_| E::custom(RationalError::Overflow))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom(RationalError::Parse(v.to_string())));
        }
        // f64's Display never uses exponents, so this is a plain decimal.
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RationalVisitor)
    }
}
