use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Tensors in this crate always own contiguous, row-major storage,
/// so strides follow directly from the dimensions.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<usize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    let strides = Self::make_strides(dims);
    Self {
      dims: dims.to_vec(),
      strides,
    }
  }

  fn make_strides(dims: &[usize]) -> Vec<usize> {
    if dims.len() == 0 { return vec![] }
    let mut strides = vec![0; dims.len()];
    strides[dims.len() - 1] = 1;
    for i in (1..dims.len()).rev() {
      strides[i - 1] = dims[i] * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub(crate) fn index(&self, indices: &[usize]) -> usize {
    assert!(indices.len() <= self.rank());
    // Append missing dimensions as zero
    indices.iter()
      .chain(std::iter::repeat(&0))
      .zip(&self.strides)
      .map(|(&i, &s)| i * s)
      .sum()
  }

  /// Number of elements in one entry along the first dimension.

  pub fn row_size(&self) -> usize {
    self.dims.iter().skip(1).product()
  }

  pub fn at_or(&self, idx: isize, or: usize) -> usize {
    let off_bounds = if idx < 0 {
      idx.abs() as usize > self.rank()
    } else {
      idx as usize >= self.rank()
    };
    if off_bounds { or } else { self[idx] }
  }

  /// Reinterpret the same number of elements using different dimensions.
  /// A zero acts as a placeholder to be inferred from the remaining ones.

  pub fn view(&self, shape: &[usize]) -> Option<Self> {
    let dims: Vec<usize> = shape.iter().enumerate().map(|(i, &n)| if n == 0 {
      let product: usize =
        shape[0..i].iter()
        .chain(shape[i + 1..shape.len()].iter())
        .product();
      if product == 0 { 0 } else { self.size() / product }
    } else {
      n
    }).collect();
    let shape = Self::new(&dims);
    (shape.size() == self.size()).then(|| shape )
  }

  pub fn with_dim(&self, dim: isize, n: usize) -> Self {
    let d = negative_index(dim, self.rank(), false);
    let mut dims = self.dims.clone();
    dims[d] = n;
    Self::new(&dims)
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index<'a>(&'a self, i: isize) -> &'a usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}
