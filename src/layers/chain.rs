use tracing::debug;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  data::{ Data, Width },
  model::{ Model, Kind, Dim, Dims, Backprop, Context },
};


/// Feed the output of `first` into `second`.

pub fn chain<T: Real>(first: Model<T>, second: Model<T>) -> Result<Model<T>> {
  chains(vec![first, second])
}

/// Compose two or more layers into one, applied left to right.
///
/// If the first layer is itself a composite, the remaining layers are
/// appended to it instead of nesting, so building a pipeline step by
/// step yields the same flat list of sublayers as building it at once.
/// The composite gets initialized right away if the input width of its
/// first and output width of its last sublayer are known.

pub fn chains<T: Real>(layers: Vec<Model<T>>) -> Result<Model<T>> {
  let count = layers.len();
  let mut layers = layers.into_iter();
  let (Some(first), Some(second)) = (layers.next(), layers.next()) else {
    return Err(Error::TooFewLayers(count))
  };

  let mut model = if first.kind() == Kind::Chain {
    let mut model = first;
    model.layers.push(second);
    model.layers.extend(layers);
    debug!(layers = model.layers.len(), "flattened composite");
    // Output width now belongs to a different last layer, whose
    // parameters may not exist yet
    model.unset_dim(Dim::NO);
    model.clear_initialized();
    model
  } else {
    let mut all = vec![first, second];
    all.extend(layers);
    Model::new("", Kind::Chain, Dims::io(None, None), all)
  };
  model.name = model.layers.iter()
    .map(|layer| layer.name() )
    .collect::<Vec<_>>()
    .join(">>");

  let n_i = model.layers.first().and_then(|layer| layer.dim(Dim::NI) );
  let n_o = model.layers.last().and_then(|layer| layer.dim(Dim::NO) );
  if let Some(n) = n_i { model.set_dim(Dim::NI, n)? }
  if let Some(n) = n_o { model.set_dim(Dim::NO, n)? }
  if n_i.is_some() && n_o.is_some() {
    debug!(layer = %model.name, "eager initialization");
    model.initialize(None, None)?;
  }
  Ok(model)
}

/// Compose layers in order: `chain![a, b, c]`.

#[macro_export]
macro_rules! chain {
  ($first:expr, $second:expr $(, $rest:expr)* $(,)?) => {
    $crate::layers::chains(vec![$first, $second $(, $rest)*])
  };
}


pub(crate) fn forward<T: Real>(model: &Model<T>, x: Data<T>, is_train: bool) -> Result<(Data<T>, Backprop<T>)> {
  let mut x = x;
  let mut callbacks = Vec::with_capacity(model.layers.len());
  for layer in &model.layers {
    let (y, callback) = layer.forward(x, is_train)?;
    callbacks.push(callback);
    x = y;
  }
  Ok((x, model.backprop(Context::Chain(callbacks))))
}

pub(crate) fn backprop<T: Real>(model: &mut Model<T>, callbacks: Vec<Backprop<T>>, dy: Data<T>) -> Result<Data<T>> {
  debug_assert_eq!(model.layers.len(), callbacks.len());
  let mut dy = dy;
  for (layer, callback) in model.layers.iter_mut().zip(callbacks).rev() {
    dy = callback.backward(layer, dy)?;
  }
  Ok(dy)
}

/// Work out sublayer dimensions from sample data, then initialize every
/// sublayer.
///
/// A sample target first fills in unset output widths from the back: each
/// sublayer's known input width becomes the output width of the one before
/// it, until a sublayer doesn't know its input width. A sample input is
/// then pushed through the sublayers front to back, so each one sees a
/// realistic input.

pub(crate) fn init<T: Real>(model: &mut Model<T>, x: Option<&Data<T>>, y: Option<&Data<T>>) -> Result<()> {
  if model.layers.is_empty() { return Ok(()) }

  if x.is_some() || y.is_some() {
    let mut n_o = y.and_then(|y| y.width() ).or(model.dim(Dim::NO));
    for layer in model.layers.iter_mut().rev() {
      if let Some(n) = n_o {
        if layer.declares(Dim::NO) && !layer.has_dim(Dim::NO) {
          debug!(layer = %layer.name(), n_o = n, "inferred output width");
          layer.set_dim(Dim::NO, n)?;
        }
      }
      match layer.dim(Dim::NI) {
        Some(n_i) => n_o = Some(n_i),
        None => {
          debug!(layer = %layer.name(), "input width unknown, stopping output width inference");
          break
        },
      }
    }
  }

  let mut x = x.cloned();
  if let Some((last, rest)) = model.layers.split_last_mut() {
    for layer in rest {
      layer.initialize(x.as_ref(), None)?;
      if let Some(sample) = x.take() {
        x = Some(layer.predict(sample)?);
      }
    }
    last.initialize(x.as_ref(), y)?;
  }

  let n_i = model.layers.first().and_then(|layer| layer.dim(Dim::NI) );
  let n_o = model.layers.last().and_then(|layer| layer.dim(Dim::NO) );
  if let Some(n) = n_i { model.set_dim(Dim::NI, n)? }
  if let Some(n) = n_o { model.set_dim(Dim::NO, n)? }
  Ok(())
}
