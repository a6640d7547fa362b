use crate::{ shape::Shape, model::Dim };


/// All errors that can occur while building, initializing or running layers.

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Feature exists in the configuration surface but has no implementation.
  #[error("{0}")]
  NotImplemented(String),

  /// Raised by the numeric runtime when operands don't line up.
  #[error("shape mismatch in {op}: {lhs} vs {rhs}")]
  ShapeMismatch { op: &'static str, lhs: Shape, rhs: Shape },

  #[error("layer '{layer}' is missing dimension {dim}")]
  MissingDim { layer: String, dim: Dim },

  #[error("attempt to change dimension {dim} of layer '{layer}' from {old} to {new}")]
  DimChange { layer: String, dim: Dim, old: usize, new: usize },

  #[error("layer '{layer}' has no parameter '{param}', was it initialized?")]
  MissingParam { layer: String, param: &'static str },

  #[error("layer '{layer}' expected {expected} data, got {got}")]
  UnexpectedData { layer: String, expected: &'static str, got: &'static str },

  #[error("composition needs at least two layers, got {0}")]
  TooFewLayers(usize),

  #[error("no layer registered under '{0}'")]
  UnknownLayer(String),

  #[error("invalid layer config: {0}")]
  InvalidConfig(String),

  #[error("could not encode or decode layer config: {0}")]
  Encoding(#[from] postcard::Error),
}

impl Error {
  pub(crate) fn shape(op: &'static str, lhs: &Shape, rhs: &Shape) -> Self {
    Self::ShapeMismatch { op, lhs: lhs.clone(), rhs: rhs.clone() }
  }
}

pub type Result<T> = std::result::Result<T, Error>;
