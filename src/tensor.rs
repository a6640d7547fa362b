use std::ops::Range;
use std::fmt::Debug;

use rand::Rng;

mod cops;
mod lops;
pub mod gates;

use crate::{
  internal::*,
  shape::Shape,
  scalar::{ Inner, Numeric, Real },
};


/// Multidimensional array with owned, contiguous storage.
///
/// This is the numeric runtime every layer computes with. Buffers are
/// never shared, so each forward call owns the activations it produces
/// and may hand them over to its backward context without copying.

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Vec<T>,
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  pub fn init(shape: &[usize], mut cb: impl FnMut(usize) -> T) -> Self {
    let shape = Shape::new(shape);
    let data = (0..shape.size()).map(|i| cb(i) ).collect();
    Self::from_shape(shape, data)
  }

  /// Stack equally shaped tensors along a new leading dimension.

  pub fn rows(rows: &[Tensor<T>]) -> Self {
    let mut dims = rows[0].shape.dims.clone();
    dims.insert(0, rows.len());
    let data = rows.iter()
      .map(|row| row.data.clone() )
      .collect::<Vec<_>>()
      .concat();
    Self::new(&dims, data)
  }

  pub fn shape(&self) -> &Shape {
    &self.shape
  }

  pub fn dim(&self, idx: isize) -> usize {
    self.shape[idx]
  }

  pub fn raw(&self) -> &[T] {
    &self.data
  }

  pub fn raw_mut(&mut self) -> &mut [T] {
    &mut self.data
  }

  pub fn into_raw(self) -> Vec<T> {
    self.data
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.data.iter().copied().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Combine with `rhs` element by element. `rhs` may be a scalar or have
  /// the trailing dimensions of `self`, in which case it gets repeated.

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let n = rhs.size();
    assert!(n == 1 || self.shape.dims.ends_with(&rhs.shape.dims),
      "Could not broadcast {} & {}", self.shape, rhs.shape);
    let data = self.data.iter()
      .zip(rhs.data.iter().cycle())
      .map(|(&a, &b)| cb((a, b)) )
      .collect();
    Tensor::new(&self.shape.dims, data)
  }

  /// Copy out the sub-tensor addressed by leading `indices`.

  pub fn at(&self, indices: &[usize]) -> Self {
    let dims = &self.shape.dims[indices.len()..];
    let start = self.shape.index(indices);
    let len = dims.iter().product::<usize>();
    Self::new(dims, self.data[start..start + len].to_vec())
  }

  /// Copy a range of entries along the first dimension.

  pub fn range(&self, range: Range<usize>) -> Self {
    assert!(range.end <= self.shape[0], "Range {:?} out of bounds for {}", range, self.shape);
    let row = self.shape.row_size();
    let dims = self.shape.with_dim(0, range.len()).dims;
    Self::new(&dims, self.data[range.start * row..range.end * row].to_vec())
  }

  /// Overwrite entries along the first dimension, starting at `start`.

  pub fn assign_range(&mut self, start: usize, other: &Self) {
    let row = self.shape.row_size();
    assert!(other.shape.row_size() == row && start + other.shape[0] <= self.shape[0],
      "Could not assign {} to {} at {start}", other.shape, self.shape);
    self.data[start * row..start * row + other.size()].copy_from_slice(&other.data);
  }

  /// Overwrite the sub-tensor addressed by leading `indices`.

  pub fn assign_at(&mut self, indices: &[usize], other: &Self) {
    let start = self.shape.index(indices);
    let len: usize = self.shape.dims[indices.len()..].iter().product();
    assert!(other.size() <= len, "Could not assign {} at {:?} of {}", other.shape, indices, self.shape);
    self.data[start..start + other.size()].copy_from_slice(&other.data);
  }
}

impl<T: Numeric> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::init(shape, |i| T::from(i).unwrap() * step + start )
  }

  pub fn hot_encode(idx: usize, size: usize) -> Self {
    let mut a = vec![T::zero(); size];
    a[idx] = T::one();
    Self::new(&[size], a)
  }

  pub fn add(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a + b )
  }

  pub fn sub(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a - b )
  }

  pub fn mul(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a * b )
  }

  pub fn div(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a / b )
  }

  pub fn sum(&self) -> T {
    self.data.iter().copied().sum()
  }

  /// Sum over the leading dimension.

  pub fn sum_rows(&self) -> Self {
    let row = self.shape.row_size();
    let mut out = vec![T::zero(); row];
    for chunk in self.data.chunks(row.max(1)) {
      for (o, &a) in out.iter_mut().zip(chunk) {
        *o += a;
      }
    }
    Self::new(&self.shape.dims[1..], out)
  }
}

impl<T: Numeric> std::ops::AddAssign<&Tensor<T>> for Tensor<T> {
  fn add_assign(&mut self, rhs: &Tensor<T>) {
    assert_eq!(self.shape, rhs.shape, "Could not accumulate {} into {}", rhs.shape, self.shape);
    for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
      *a += b;
    }
  }
}

impl<T: Real> Tensor<T> {
  pub fn rand(shape: &[usize]) -> Self {
    let mut rng = rand::thread_rng();
    Self::init(shape, |_| rng.gen_range(T::zero(), T::one()) )
  }

  pub fn randn(shape: &[usize]) -> Self {
    let len = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len as f64 / 2.0).ceil() as usize {
      let j = i * 2;
      let (r1, r2): (T, T) = randn();
      data[j] = r1;
      data[(j + 1) % len] = r2;
    }
    Self::new(shape, data)
  }

  /// Uniform samples scaled by fan-in and fan-out of the last two dims.

  pub fn glorot_uniform(shape: &[usize]) -> Self {
    let shape_ = Shape::new(shape);
    let fan = shape_.at_or(-1, 1) + shape_.at_or(-2, 1);
    let limit = T::from((6.0 / fan as f64).sqrt()).unwrap();
    let mut rng = rand::thread_rng();
    Self::init(shape, |_| rng.gen_range(-limit, limit) )
  }

  pub fn sigmoid(&self) -> Self {
    self.vectorize(|a| T::one() / (T::one() + (-a).exp()) )
  }

  pub fn tanh(&self) -> Self {
    self.vectorize(|a| a.tanh() )
  }

  pub fn relu(&self) -> Self {
    self.vectorize(|a| a.max(T::zero()) )
  }

  /// Largest absolute element-wise difference to `rhs`.

  pub fn max_diff(&self, rhs: &Self) -> T {
    self.data.iter()
      .zip(&rhs.data)
      .map(|(&a, &b)| num_traits::real::Real::abs(a - b) )
      .fold(T::zero(), |acc, d| acc.max(d) )
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} ", self.shape.dims)?;
    print_chunks(0, &self.shape, &self.data, f)?;
    Ok(())
  }
}

fn print_chunks<T: Debug>(idx: usize, shape: &Shape, vec: &[T], f: &mut std::fmt::Formatter) -> std::fmt::Result {
  let indent = (0..idx * 2).map(|_| " ").collect::<String>();
  if shape.rank() == 0 {
    write!(f, "{indent}{:?}", vec[0])?;
  } else if idx == shape.rank() - 1 || vec.is_empty() {
    write!(f, "{indent}{:?}\n", vec)?;
  } else {
    let chunks = vec.chunks(vec.len() / shape.dims[idx]);
    write!(f, "{indent}[\n")?;
    for chunk in chunks {
      print_chunks(idx + 1, shape, chunk, f)?;
    }
    write!(f, "{indent}]\n")?;
  }
  Ok(())
}
