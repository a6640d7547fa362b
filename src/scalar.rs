use rand::{distributions::uniform::SampleUniform};
use num_traits::{NumAssignOps, Num, NumCast};


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + Send + Sync + std::fmt::Debug> Inner for T {}


/// All numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Numeric: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum {}
impl<T: Inner + PartialOrd + Num + NumCast + NumAssignOps + std::iter::Sum> Numeric for T {}


/// All signed numeric types.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Signed: Numeric + num_traits::Signed {}
impl<T: Numeric + num_traits::Signed> Signed for T {}


/// General matrix multiply `c = a * b` over row-major buffers.
///
/// Implemented for `f32` and `f64`.

pub trait Gemm: Sized {
  fn gemm(rows_l: usize, cols_l: usize, cols_r: usize, lhs: &[Self], rhs: &[Self], out: &mut [Self]);
}


/// All continuous numeric types that layers can compute with.
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Real: Signed + num_traits::real::Real + SampleUniform + Gemm + 'static {}
impl<T: Signed + num_traits::real::Real + SampleUniform + Gemm + 'static> Real for T {}
