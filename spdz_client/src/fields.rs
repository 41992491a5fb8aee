use std::fmt;

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Element of a prime field whose modulus is only known at runtime.
///
/// Elements are created by a [`PrimeField`] and stay reduced modulo its prime,
/// so equality is plain value equality. Elements decoded from the wire are
/// not checked until [`PrimeField::contains`] is called on them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Gfp(BigUint);

impl fmt::Display for Gfp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Gfp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_bytes_le().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Gfp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Ok(Gfp(BigUint::from_bytes_le(&bytes)))
    }
}

/// Arithmetic context of the prime field `GF(p)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimeField {
    modulus: BigUint,
}

impl PrimeField {
    /// Create context for given modulus. Rejects moduli that are not prime.
    pub fn new(modulus: BigUint) -> Result<Self, ConfigError> {
        if !num_prime::nt_funcs::is_prime(&modulus, None).probably() {
            return Err(ConfigError::InvalidModulus(modulus.to_string()));
        }
        Ok(Self { modulus })
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Bit length of the modulus.
    pub fn bits(&self) -> u64 {
        self.modulus.bits()
    }

    pub fn zero(&self) -> Gfp {
        Gfp(BigUint::zero())
    }

    pub fn one(&self) -> Gfp {
        Gfp(BigUint::one())
    }

    /// Reduce arbitrary integer into the field.
    pub fn from_biguint(&self, value: BigUint) -> Gfp {
        Gfp(value % &self.modulus)
    }

    pub fn from_u64(&self, value: u64) -> Gfp {
        self.from_biguint(BigUint::from(value))
    }

    /// Embed signed integer, mapping `-v` to `p - v`.
    pub fn from_i64(&self, value: i64) -> Gfp {
        let magnitude = self.from_u64(value.unsigned_abs());
        if value < 0 {
            self.neg(&magnitude)
        } else {
            magnitude
        }
    }

    /// Signed representative in `(-p/2, p/2]`.
    pub fn to_signed(&self, x: &Gfp) -> BigInt {
        if x.0 > &self.modulus >> 1u32 {
            BigInt::from(x.0.clone()) - BigInt::from(self.modulus.clone())
        } else {
            BigInt::from(x.0.clone())
        }
    }

    /// Check that element is canonical for this field.
    pub fn contains(&self, x: &Gfp) -> bool {
        x.0 < self.modulus
    }

    pub fn add(&self, a: &Gfp, b: &Gfp) -> Gfp {
        let sum = &a.0 + &b.0;
        if sum >= self.modulus {
            Gfp(sum - &self.modulus)
        } else {
            Gfp(sum)
        }
    }

    pub fn sub(&self, a: &Gfp, b: &Gfp) -> Gfp {
        if a.0 >= b.0 {
            Gfp(&a.0 - &b.0)
        } else {
            Gfp(&self.modulus - &b.0 + &a.0)
        }
    }

    pub fn neg(&self, a: &Gfp) -> Gfp {
        if a.0.is_zero() {
            a.clone()
        } else {
            Gfp(&self.modulus - &a.0)
        }
    }

    pub fn mul(&self, a: &Gfp, b: &Gfp) -> Gfp {
        Gfp((&a.0 * &b.0) % &self.modulus)
    }

    /// Sum of all elements, zero for an empty iterator.
    pub fn sum<'a>(&self, items: impl IntoIterator<Item = &'a Gfp>) -> Gfp {
        items
            .into_iter()
            .fold(self.zero(), |acc, x| self.add(&acc, x))
    }

    /// Uniformly random element.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Gfp {
        Gfp(rng.gen_biguint_below(&self.modulus))
    }
}

/// Extension degree used when none is configured.
pub const DEFAULT_GF2N_DEGREE: u32 = 128;

/// Low-weight irreducible polynomials `x^n + tail` for supported degrees.
/// Tail is listed as exponents of its non-zero terms.
const IRREDUCIBLE_TAILS: [(u32, &[u32]); 4] = [
    (40, &[5, 4, 3, 0]),
    (63, &[1, 0]),
    (64, &[4, 3, 1, 0]),
    (128, &[7, 2, 1, 0]),
];

/// Element of `GF(2^n)` as a polynomial over `GF(2)`, bit `i` holding the coefficient of `x^i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gf2nElement(u128);

impl Gf2nElement {
    pub fn bits(&self) -> u128 {
        self.0
    }
}

/// Arithmetic context of the binary extension field `GF(2^n)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryField {
    degree: u32,
    reduction: u128,
}

impl BinaryField {
    /// Create context for given extension degree.
    pub fn new(degree: u32) -> Result<Self, ConfigError> {
        let (_, tail) = IRREDUCIBLE_TAILS
            .iter()
            .find(|(n, _)| *n == degree)
            .ok_or(ConfigError::UnsupportedDegree(degree))?;
        let reduction = tail.iter().fold(0u128, |acc, &e| acc | (1u128 << e));
        Ok(Self { degree, reduction })
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    fn mask(&self) -> u128 {
        if self.degree == 128 {
            u128::MAX
        } else {
            (1u128 << self.degree) - 1
        }
    }

    /// Element with given coefficient bits, `None` if they exceed the degree.
    pub fn element(&self, bits: u128) -> Option<Gf2nElement> {
        if bits & !self.mask() == 0 {
            Some(Gf2nElement(bits))
        } else {
            None
        }
    }

    pub fn add(&self, a: Gf2nElement, b: Gf2nElement) -> Gf2nElement {
        Gf2nElement(a.0 ^ b.0)
    }

    /// Carry-less multiplication reduced by the field polynomial.
    pub fn mul(&self, a: Gf2nElement, b: Gf2nElement) -> Gf2nElement {
        let top = 1u128 << (self.degree - 1);
        let mask = self.mask();
        let (mut a, mut b) = (a.0, b.0);
        let mut result = 0u128;
        while b != 0 {
            if b & 1 == 1 {
                result ^= a;
            }
            b >>= 1;
            let carry = a & top != 0;
            a = (a << 1) & mask;
            if carry {
                a ^= self.reduction;
            }
        }
        Gf2nElement(result)
    }
}
