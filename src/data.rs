use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  scalar::{ Inner, Numeric },
};


/// Report the feature width of a batch of vectors.

pub trait Width {
  fn width(&self) -> Option<usize>;
}

impl<T: Inner> Width for Tensor<T> {
  fn width(&self) -> Option<usize> {
    (self.rank() > 0).then(|| self.shape()[-1] )
  }
}

impl<T: Inner> Width for Vec<Tensor<T>> {
  fn width(&self) -> Option<usize> {
    self.first().and_then(|first| first.width() )
  }
}


/// Memory and hidden output carried between recurrent steps,
/// both `(batch, units)`.

#[derive(Debug, Clone, PartialEq)]
pub struct RnnState<T: Inner> {
  pub cells: Tensor<T>,
  pub hiddens: Tensor<T>,
}

impl<T: Numeric> RnnState<T> {
  pub fn zeros(batch: usize, units: usize) -> Self {
    Self {
      cells: Tensor::zeros(&[batch, units]),
      hiddens: Tensor::zeros(&[batch, units]),
    }
  }
}


/// Variable length sequences, concatenated along the first dimension.

#[derive(Debug, Clone, PartialEq)]
pub struct Ragged<T: Inner> {
  pub data: Tensor<T>,
  pub lengths: Vec<usize>,
}

impl<T: Inner> Ragged<T> {
  pub fn new(data: Tensor<T>, lengths: Vec<usize>) -> Self {
    assert_eq!(lengths.iter().sum::<usize>(), data.shape()[0],
      "Lengths {:?} don't cover {}", lengths, data.shape());
    Self { data, lengths }
  }
}

impl<T: Inner> Width for Ragged<T> {
  fn width(&self) -> Option<usize> {
    self.data.width()
  }
}


/// Time-major batch of sequences, `(steps, batch, width)`.
///
/// Sequences are sorted by descending length, so at step `t` only the
/// first `size_at_t[t]` batch rows hold data. `indices[i]` is the
/// original position of batch row `i`.

#[derive(Debug, Clone, PartialEq)]
pub struct Padded<T: Inner> {
  pub data: Tensor<T>,
  pub size_at_t: Vec<usize>,
  pub lengths: Vec<usize>,
  pub indices: Vec<usize>,
}

impl<T: Numeric> Padded<T> {
  pub fn from_sequences(seqs: &[Tensor<T>]) -> Result<Self> {
    let width = seqs.first().and_then(|first| first.width() ).unwrap_or(0);
    for seq in seqs {
      if seq.rank() != 2 || seq.shape()[1] != width {
        return Err(Error::shape("padded", seqs[0].shape(), seq.shape()))
      }
    }
    let mut indices: Vec<usize> = (0..seqs.len()).collect();
    indices.sort_by_key(|&i| std::cmp::Reverse(seqs[i].shape()[0]) );
    let lengths: Vec<usize> = indices.iter().map(|&i| seqs[i].shape()[0] ).collect();
    let steps = lengths.first().copied().unwrap_or(0);
    let size_at_t = (0..steps)
      .map(|t| lengths.iter().filter(|&&len| len > t ).count() )
      .collect();
    let mut data = Tensor::zeros(&[steps, seqs.len(), width]);
    for (b, &i) in indices.iter().enumerate() {
      for t in 0..lengths[b] {
        data.assign_at(&[t, b], &seqs[i].at(&[t]));
      }
    }
    Ok(Self { data, size_at_t, lengths, indices })
  }

  /// Unpad back into sequences, in their original order.

  pub fn to_sequences(&self) -> Vec<Tensor<T>> {
    let width = self.data.shape()[-1];
    let mut seqs = vec![Tensor::zeros(&[0, width]); self.indices.len()];
    for (b, &i) in self.indices.iter().enumerate() {
      let rows: Vec<_> = (0..self.lengths[b]).map(|t| self.data.at(&[t, b]) ).collect();
      seqs[i] = if rows.is_empty() { Tensor::zeros(&[0, width]) } else { Tensor::rows(&rows) };
    }
    seqs
  }

  /// Same layout and bookkeeping, different values.

  pub fn with_data(&self, data: Tensor<T>) -> Self {
    Self {
      data,
      size_at_t: self.size_at_t.clone(),
      lengths: self.lengths.clone(),
      indices: self.indices.clone(),
    }
  }
}

impl<T: Inner> Width for Padded<T> {
  fn width(&self) -> Option<usize> {
    self.data.width()
  }
}


/// Values passed between layers: inputs, outputs and their gradients.

#[derive(Debug, Clone, PartialEq)]
pub enum Data<T: Inner> {
  Floats2d(Tensor<T>),
  Ragged(Ragged<T>),
  Padded(Padded<T>),
  List(Vec<Tensor<T>>),
  /// Recurrent step: `(state, input)` going in, `(state, hiddens)` coming out.
  Step(RnnState<T>, Tensor<T>),
}

impl<T: Inner> Data<T> {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Floats2d(_) => "Floats2d",
      Self::Ragged(_) => "Ragged",
      Self::Padded(_) => "Padded",
      Self::List(_) => "List",
      Self::Step(..) => "Step",
    }
  }

  pub fn into_floats2d(self, layer: &str) -> Result<Tensor<T>> {
    match self {
      Self::Floats2d(x) => Ok(x),
      other => Err(other.unexpected(layer, "Floats2d")),
    }
  }

  pub fn into_padded(self, layer: &str) -> Result<Padded<T>> {
    match self {
      Self::Padded(x) => Ok(x),
      other => Err(other.unexpected(layer, "Padded")),
    }
  }

  pub fn into_step(self, layer: &str) -> Result<(RnnState<T>, Tensor<T>)> {
    match self {
      Self::Step(state, x) => Ok((state, x)),
      other => Err(other.unexpected(layer, "Step")),
    }
  }

  pub fn as_floats2d(&self) -> Option<&Tensor<T>> {
    match self {
      Self::Floats2d(x) => Some(x),
      _ => None,
    }
  }

  pub(crate) fn unexpected(&self, layer: &str, expected: &'static str) -> Error {
    Error::UnexpectedData { layer: layer.to_string(), expected, got: self.kind() }
  }
}

/// Only plain containers report a width. A recurrent step has two
/// (input and hidden), so layers working on steps inspect it themselves.

impl<T: Inner> Width for Data<T> {
  fn width(&self) -> Option<usize> {
    match self {
      Self::Floats2d(x) => x.width(),
      Self::Ragged(x) => x.width(),
      Self::Padded(x) => x.width(),
      Self::List(x) => x.width(),
      Self::Step(..) => None,
    }
  }
}

impl<T: Inner> From<Tensor<T>> for Data<T> {
  fn from(x: Tensor<T>) -> Self {
    Self::Floats2d(x)
  }
}
