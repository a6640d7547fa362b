use crate::{
  internal::*,
  error::{ Error, Result },
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Numeric, Real },
};


impl<T: Inner> Tensor<T> {
  pub fn reshape(&self, dims: &[usize]) -> Result<Self> {
    let shape = self.shape.view(dims)
      .ok_or_else(|| Error::shape("reshape", &self.shape, &Shape::new(dims)) )?;
    Ok(Self { shape, data: self.data.clone() })
  }

  /// Join with `rhs` along `dim`. All other dimensions must agree.

  pub fn concat(&self, rhs: &Self, dim: isize) -> Result<Self> {
    if self.rank() != rhs.rank() || self.rank() == 0 {
      return Err(Error::shape("concat", &self.shape, &rhs.shape))
    }
    let dim = negative_index(dim, self.rank(), false);
    let mut dims_l = self.shape.dims.clone();
    dims_l[dim] += rhs.shape.dims[dim];
    let mut dims_r = rhs.shape.dims.clone();
    dims_r[dim] += self.shape.dims[dim];
    if dims_l != dims_r {
      return Err(Error::shape("concat", &self.shape, &rhs.shape))
    }
    let block_l: usize = self.shape.dims[dim..].iter().product();
    let block_r: usize = rhs.shape.dims[dim..].iter().product();
    let outer: usize = self.shape.dims[..dim].iter().product();
    let mut data = Vec::with_capacity(self.size() + rhs.size());
    for o in 0..outer {
      data.extend_from_slice(&self.data[o * block_l..(o + 1) * block_l]);
      data.extend_from_slice(&rhs.data[o * block_r..(o + 1) * block_r]);
    }
    Ok(Self::new(&dims_l, data))
  }

  /// Inverse of [concat](Tensor::concat): cut `dim` into `[0, at)` and `[at, n)`.

  pub fn split(&self, at: usize, dim: isize) -> Result<(Self, Self)> {
    if self.rank() == 0 {
      return Err(Error::shape("split", &self.shape, &Shape::new(&[at])))
    }
    let dim = negative_index(dim, self.rank(), false);
    let n = self.shape.dims[dim];
    if at > n {
      return Err(Error::shape("split", &self.shape, &self.shape.with_dim(dim as isize, at)))
    }
    let inner: usize = self.shape.dims[dim + 1..].iter().product();
    let outer: usize = self.shape.dims[..dim].iter().product();
    let (mut left, mut right) = (vec![], vec![]);
    for o in 0..outer {
      let start = o * n * inner;
      left.extend_from_slice(&self.data[start..start + at * inner]);
      right.extend_from_slice(&self.data[start + at * inner..start + n * inner]);
    }
    Ok((
      Self::new(&self.shape.with_dim(dim as isize, at).dims, left),
      Self::new(&self.shape.with_dim(dim as isize, n - at).dims, right),
    ))
  }

  /// Swap the two dimensions of a matrix.

  pub fn transpose(&self) -> Self {
    assert_eq!(self.rank(), 2, "Can only transpose matrices, got {}", self.shape);
    let (rows, cols) = (self.shape[0], self.shape[1]);
    let mut data = Vec::with_capacity(self.size());
    for j in 0..cols {
      for i in 0..rows {
        data.push(self.data[i * cols + j]);
      }
    }
    Self::new(&[cols, rows], data)
  }
}

impl<T: Real> Tensor<T> {
  /// Matrix multiplication of two rank 2 tensors.

  pub fn mm(&self, rhs: &Self) -> Result<Self> {
    if self.rank() != 2 || rhs.rank() != 2 || self.shape[1] != rhs.shape[0] {
      return Err(Error::shape("mm", &self.shape, &rhs.shape))
    }
    let data = self.matmul(rhs);
    Ok(Self::new(&[self.shape[0], rhs.shape[1]], data))
  }
}

impl<T: Numeric> std::ops::Neg for &Tensor<T> where T: std::ops::Neg<Output = T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Numeric> std::ops::$trait for &Tensor<T> { // &self * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.$meth(rhs)
      }
    }

    impl<T: Numeric> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        (&self).$meth(&rhs)
      }
    }

    impl<T: Numeric> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        (self).$meth(&rhs)
      }
    }

    impl<T: Numeric> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        (&self).$meth(rhs)
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Numeric> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        (&self).vectorize(|a| a $symbol rhs )
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn concat() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let b = Tensor::new(&[2,3], vec![7, 8, 9, 10, 11, 12]);
    assert_eq!(a.concat(&b, 1).unwrap(), Tensor::new(&[2,6], vec![1, 2, 3, 7, 8, 9, 4, 5, 6, 10, 11, 12]));

    let b = Tensor::new(&[2,4], vec![7, 8, 9, 10, 11, 12, 13, 14]);
    assert_eq!(a.concat(&b, -1).unwrap(), Tensor::new(&[2,7], vec![1, 2, 3, 7, 8, 9, 10, 4, 5, 6, 11, 12, 13, 14]));

    let b = Tensor::new(&[1,3], vec![7, 8, 9]);
    assert_eq!(a.concat(&b, 0).unwrap(), Tensor::new(&[3,3], vec![1, 2, 3, 4, 5, 6, 7, 8, 9]));
  }

  #[test]
  fn concat_mismatch() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    let b = Tensor::new(&[3,1], vec![7, 8, 9]);
    assert!(matches!(a.concat(&b, 1), Err(Error::ShapeMismatch { op: "concat", .. })));
  }

  #[test]
  fn split() {
    let a = Tensor::new(&[2,6], vec![1, 2, 3, 7, 8, 9, 4, 5, 6, 10, 11, 12]);
    let (l, r) = a.split(3, 1).unwrap();
    assert_eq!(l, Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]));
    assert_eq!(r, Tensor::new(&[2,3], vec![7, 8, 9, 10, 11, 12]));

    let (l, r) = a.split(1, -1).unwrap();
    assert_eq!(l.shape().dims, vec![2,1]);
    assert_eq!(r.shape().dims, vec![2,5]);
    assert!(a.split(7, 1).is_err());
  }

  #[test]
  fn reshape() {
    let a = Tensor::arrange(&[2,8], 0, 1);
    let b = a.reshape(&[2,4,2]).unwrap();
    assert_eq!(b.at(&[1,0]), Tensor::vec(&[8, 9]));
    assert!(a.reshape(&[3,5]).is_err());
  }

  #[test]
  fn transpose() {
    let a = Tensor::new(&[2,3], vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(a.transpose(), Tensor::new(&[3,2], vec![1, 4, 2, 5, 3, 6]));
  }

  #[test]
  fn operators() {
    let a = Tensor::new(&[2], vec![1.0, 2.0]);
    let b = Tensor::new(&[2], vec![3.0, 5.0]);
    assert_eq!(&a + &b, Tensor::vec(&[4.0, 7.0]));
    assert_eq!(&b - &a, Tensor::vec(&[2.0, 3.0]));
    assert_eq!(&a * 2.0, Tensor::vec(&[2.0, 4.0]));
    assert_eq!(-&a, Tensor::vec(&[-1.0, -2.0]));
  }

  #[test]
  fn mm() {
    let x = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let y = Tensor::new(&[3,2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(x.mm(&y).unwrap(), Tensor::new(&[2,2], vec![22.0, 28.0, 49.0, 64.0]));
    assert!(matches!(x.mm(&x), Err(Error::ShapeMismatch { op: "mm", .. })));
  }
}
