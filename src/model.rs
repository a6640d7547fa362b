use std::collections::{ HashMap, BTreeMap };

use tracing::trace;

use crate::{
  internal::*,
  error::{ Error, Result },
  scalar::Real,
  tensor::Tensor,
  data::Data,
  layers::{ chain, affine, relu, lstm, recurrent },
};


/// Named integer properties of a layer.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dim {
  /// Input width
  NI,
  /// Output width
  NO,
}

impl std::fmt::Display for Dim {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      Self::NI => write!(f, "nI"),
      Self::NO => write!(f, "nO"),
    }
  }
}


/// Declared dimensions of a layer and their values, if already known.
///
/// A dimension missing from the map is not a concept the layer has at all,
/// which is different from being declared but unset.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dims(BTreeMap<Dim, Option<usize>>);

impl Dims {
  /// No dimensions at all.
  pub fn none() -> Self {
    Self::default()
  }

  /// Both input and output width, each possibly unset.
  pub fn io(n_o: Option<usize>, n_i: Option<usize>) -> Self {
    Self::none().with(Dim::NO, n_o).with(Dim::NI, n_i)
  }

  pub fn with(mut self, dim: Dim, value: Option<usize>) -> Self {
    self.0.insert(dim, value);
    self
  }

  pub fn get(&self, dim: Dim) -> Option<usize> {
    self.0.get(&dim).copied().flatten()
  }

  pub fn declares(&self, dim: Dim) -> bool {
    self.0.contains_key(&dim)
  }
}


/// Forward and backward behaviour a [Model] node dispatches to.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  Chain,
  Affine,
  Relu,
  LstmStep,
  Recurrent,
}


/// A node in a tree of layers.
///
/// Every layer, from a single affine transform to a deep recurrent stack,
/// is a `Model` with a name, a set of [Dims], parameters with matching
/// gradients and an ordered list of sublayers.

#[derive(Debug)]
pub struct Model<T: Real> {
  id: usize,
  pub(crate) name: String,
  kind: Kind,
  pub(crate) dims: Dims,
  pub(crate) layers: Vec<Model<T>>,
  params: HashMap<&'static str, Tensor<T>>,
  grads: HashMap<&'static str, Tensor<T>>,
  initialized: bool,
}

impl<T: Real> Model<T> {
  pub(crate) fn new(name: &str, kind: Kind, dims: Dims, layers: Vec<Model<T>>) -> Self {
    Self {
      id: make_id(),
      name: name.to_string(),
      kind,
      dims,
      layers,
      params: HashMap::new(),
      grads: HashMap::new(),
      initialized: false,
    }
  }

  pub fn id(&self) -> usize {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> Kind {
    self.kind
  }

  pub fn layers(&self) -> &[Model<T>] {
    &self.layers
  }

  pub fn layers_mut(&mut self) -> &mut [Model<T>] {
    &mut self.layers
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  pub(crate) fn mark_initialized(&mut self) {
    self.initialized = true;
  }

  pub(crate) fn clear_initialized(&mut self) {
    self.initialized = false;
  }

  /// This node and all of its descendants, depth first.

  pub fn walk(&self) -> Vec<&Model<T>> {
    let mut nodes = vec![self];
    for layer in &self.layers {
      nodes.extend(layer.walk());
    }
    nodes
  }

  pub fn dim(&self, dim: Dim) -> Option<usize> {
    self.dims.get(dim)
  }

  /// Is the dimension declared and set to a value?

  pub fn has_dim(&self, dim: Dim) -> bool {
    self.dims.get(dim).is_some()
  }

  pub fn declares(&self, dim: Dim) -> bool {
    self.dims.declares(dim)
  }

  pub fn get_dim(&self, dim: Dim) -> Result<usize> {
    self.dims.get(dim)
      .ok_or_else(|| Error::MissingDim { layer: self.name.clone(), dim } )
  }

  /// Set a dimension. Once known, a value may be set again but never changed.

  pub fn set_dim(&mut self, dim: Dim, value: usize) -> Result<()> {
    match self.dims.get(dim) {
      Some(old) if old != value => Err(Error::DimChange { layer: self.name.clone(), dim, old, new: value }),
      _ => {
        self.dims.0.insert(dim, Some(value));
        Ok(())
      },
    }
  }

  /// Forget a dimension value, so it can be derived again.

  pub(crate) fn unset_dim(&mut self, dim: Dim) {
    if self.dims.declares(dim) {
      self.dims.0.insert(dim, None);
    }
  }

  pub fn param(&self, name: &str) -> Option<&Tensor<T>> {
    self.params.get(name)
  }

  pub fn grad(&self, name: &str) -> Option<&Tensor<T>> {
    self.grads.get(name)
  }

  pub fn has_param(&self, name: &str) -> bool {
    self.params.contains_key(name)
  }

  pub(crate) fn get_param(&self, name: &'static str) -> Result<&Tensor<T>> {
    self.params.get(name)
      .ok_or_else(|| Error::MissingParam { layer: self.name.clone(), param: name } )
  }

  /// Replace a parameter, resetting its gradient.

  pub fn set_param(&mut self, name: &'static str, value: Tensor<T>) {
    self.grads.insert(name, Tensor::zeros(&value.shape().dims));
    self.params.insert(name, value);
  }

  pub(crate) fn inc_grad(&mut self, name: &'static str, delta: &Tensor<T>) -> Result<()> {
    let grad = self.grads.get_mut(name)
      .ok_or_else(|| Error::MissingParam { layer: self.name.clone(), param: name } )?;
    if grad.shape() != delta.shape() {
      return Err(Error::shape("inc_grad", grad.shape(), delta.shape()))
    }
    *grad += delta;
    Ok(())
  }

  /// Reset all gradients in this tree to zero.

  pub fn zero_grads(&mut self) {
    for grad in self.grads.values_mut() {
      *grad = Tensor::zeros(&grad.shape().dims);
    }
    for layer in &mut self.layers {
      layer.zero_grads();
    }
  }

  /// Infer missing dimensions and allocate parameters, using optional
  /// sample inputs and targets.
  ///
  /// Parameters that already exist are kept, so initializing a second
  /// time only fills in what is still missing.

  pub fn initialize(&mut self, x: Option<&Data<T>>, y: Option<&Data<T>>) -> Result<()> {
    match self.kind {
      Kind::Chain => chain::init(self, x, y)?,
      Kind::Affine => affine::init(self, x, y)?,
      Kind::Relu => {},
      Kind::LstmStep => lstm::init(self, x, y)?,
      Kind::Recurrent => recurrent::init(self, x, y)?,
    }
    self.initialized = true;
    Ok(())
  }

  /// Run the layer, returning its output together with the callback
  /// that maps output gradients back to input gradients.

  pub fn forward(&self, x: Data<T>, is_train: bool) -> Result<(Data<T>, Backprop<T>)> {
    trace!(layer = %self.name, input = x.kind(), is_train, "forward");
    match self.kind {
      Kind::Chain => chain::forward(self, x, is_train),
      Kind::Affine => affine::forward(self, x),
      Kind::Relu => relu::forward(self, x),
      Kind::LstmStep => lstm::forward(self, x, is_train),
      Kind::Recurrent => recurrent::forward(self, x, is_train),
    }
  }

  /// Training mode forward pass.

  pub fn begin_update(&self, x: Data<T>) -> Result<(Data<T>, Backprop<T>)> {
    self.forward(x, true)
  }

  /// Inference only. No callback is handed out.

  pub fn predict(&self, x: Data<T>) -> Result<Data<T>> {
    self.forward(x, false).map(|(y, _)| y )
  }

  pub(crate) fn backprop(&self, context: Context<T>) -> Backprop<T> {
    Backprop { model: self.id, context }
  }
}

impl<T: Real> Clone for Model<T> {
  fn clone(&self) -> Self {
    Self {
      id: make_id(),
      name: self.name.clone(),
      kind: self.kind,
      dims: self.dims.clone(),
      layers: self.layers.clone(),
      params: self.params.clone(),
      grads: self.grads.clone(),
      initialized: self.initialized,
    }
  }
}


/// Whatever a layer needs to remember from its forward pass.

#[derive(Debug)]
pub(crate) enum Context<T: Real> {
  Chain(Vec<Backprop<T>>),
  Affine(Tensor<T>),
  Relu(Tensor<T>),
  LstmStep(lstm::StepContext<T>),
  Recurrent(recurrent::SequenceContext<T>),
}


/// Backward callback of a single forward call.
///
/// Consumed by [backward](Backprop::backward), so it can run at most once.
/// Gradients of parameters are accumulated into the model passed in, which
/// must be the one that produced this callback.

#[derive(Debug)]
pub struct Backprop<T: Real> {
  model: usize,
  context: Context<T>,
}

impl<T: Real> Backprop<T> {
  pub fn backward(self, model: &mut Model<T>, dy: Data<T>) -> Result<Data<T>> {
    debug_assert_eq!(self.model, model.id,
      "Backprop callback of model #{} applied to '{}' (#{})", self.model, model.name, model.id);
    trace!(layer = %model.name, gradient = dy.kind(), "backward");
    match self.context {
      Context::Chain(callbacks) => chain::backprop(model, callbacks, dy),
      Context::Affine(x) => affine::backprop(model, x, dy),
      Context::Relu(mask) => relu::backprop(model, mask, dy),
      Context::LstmStep(context) => lstm::backprop(model, context, dy),
      Context::Recurrent(context) => recurrent::backprop(model, context, dy),
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn model() -> Model<f32> {
    Model::new("test", Kind::Affine, Dims::io(Some(3), None), vec![])
  }

  #[test]
  fn dims() {
    let model = model();
    assert_eq!(model.dim(Dim::NO), Some(3));
    assert!(model.declares(Dim::NI));
    assert!(!model.has_dim(Dim::NI));
    assert!(matches!(model.get_dim(Dim::NI), Err(Error::MissingDim { dim: Dim::NI, .. })));

    let relu = Model::<f32>::new("relu", Kind::Relu, Dims::none(), vec![]);
    assert!(!relu.declares(Dim::NI));
  }

  #[test]
  fn set_dim_once() {
    let mut model = model();
    model.set_dim(Dim::NI, 4).unwrap();
    model.set_dim(Dim::NI, 4).unwrap();
    assert_eq!(model.dim(Dim::NI), Some(4));
    let err = model.set_dim(Dim::NO, 5).unwrap_err();
    assert!(matches!(err, Error::DimChange { dim: Dim::NO, old: 3, new: 5, .. }));
    assert_eq!(err.to_string(), "attempt to change dimension nO of layer 'test' from 3 to 5");
  }

  #[test]
  fn params_and_grads() {
    let mut model = model();
    assert!(matches!(model.get_param("W"), Err(Error::MissingParam { param: "W", .. })));
    model.set_param("W", Tensor::ones(&[3, 2]));
    assert_eq!(model.grad("W"), Some(&Tensor::zeros(&[3, 2])));
    model.inc_grad("W", &Tensor::ones(&[3, 2])).unwrap();
    model.inc_grad("W", &Tensor::ones(&[3, 2])).unwrap();
    assert_eq!(model.grad("W"), Some(&Tensor::fill(&[3, 2], 2.0)));
    assert!(model.inc_grad("W", &Tensor::ones(&[2, 3])).is_err());
    model.zero_grads();
    assert_eq!(model.grad("W"), Some(&Tensor::zeros(&[3, 2])));
  }

  #[test]
  fn clones_get_fresh_ids() {
    let model = model();
    let copy = model.clone();
    assert_ne!(model.id(), copy.id());
    assert_eq!(copy.dims, model.dims);
  }
}
