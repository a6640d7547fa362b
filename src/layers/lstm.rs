use tracing::debug;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  tensor::{ Tensor, gates::{ self, NUM_GATES } },
  data::{ Data, RnnState, Width },
  model::{ Model, Kind, Dim, Dims, Backprop, Context },
  layers::{ affine, chains, recurrent },
};


/// A single LSTM step.
///
/// Maps `Step(state, input)` to `Step(new_state, hiddens)`, where the
/// returned hiddens are the hiddens of the new state. Gate activations
/// come from one affine sublayer of shape `(4·nO, nO + nI)`, applied to
/// the previous hiddens joined with the input (hiddens first).
///
/// Dropout is not available yet, any nonzero rate is rejected.

pub fn lstm_step<T: Real>(n_o: Option<usize>, n_i: Option<usize>, dropout: f64) -> Result<Model<T>> {
  if dropout != 0.0 {
    return Err(Error::NotImplemented(format!("dropout ({dropout}) in LSTM steps")))
  }
  let mut model = Model::new("lstm_step", Kind::LstmStep, Dims::io(n_o, n_i), vec![affine(None, None)]);
  if n_o.is_some() && n_i.is_some() {
    model.initialize(None, None)?;
  }
  Ok(model)
}

/// Stack of `depth` recurrent LSTM layers over padded sequences.
///
/// The first layer maps `nI` to `nO`, every following one `nO` to `nO`.
/// A depth of zero yields an empty composite that passes its input
/// through unchanged. Arguments are still validated.

pub fn lstm<T: Real>(n_o: Option<usize>, n_i: Option<usize>, depth: usize, dropout: f64) -> Result<Model<T>> {
  let mut layers = (0..depth.max(1))
    .map(|d| lstm_step(n_o, if d == 0 { n_i } else { n_o }, dropout).map(recurrent) )
    .collect::<Result<Vec<_>>>()?;
  if depth == 0 {
    return Ok(Model::new("noop", Kind::Chain, Dims::io(None, None), vec![]))
  }
  if layers.len() == 1 {
    Ok(layers.remove(0))
  } else {
    chains(layers)
  }
}


pub(crate) fn init<T: Real>(model: &mut Model<T>, x: Option<&Data<T>>, y: Option<&Data<T>>) -> Result<()> {
  match x {
    Some(Data::Step(_, inputs)) => if let Some(n) = inputs.width() { model.set_dim(Dim::NI, n)? },
    Some(other) => return Err(other.unexpected(model.name(), "Step")),
    None => {},
  }
  match y {
    Some(Data::Step(_, hiddens)) => if let Some(n) = hiddens.width() { model.set_dim(Dim::NO, n)? },
    Some(other) => return Err(other.unexpected(model.name(), "Step")),
    None => {},
  }
  let n_o = model.get_dim(Dim::NO)?;
  let n_i = model.get_dim(Dim::NI)?;
  debug!(layer = %model.name(), n_o, n_i, "allocating gate weights");
  let affine = &mut model.layers[0];
  affine.set_dim(Dim::NO, n_o * NUM_GATES)?;
  affine.set_dim(Dim::NI, n_o + n_i)?;
  affine.initialize(None, None)
}


#[derive(Debug)]
pub(crate) struct StepContext<T: Real> {
  affine: Box<Backprop<T>>,
  gates: GateContext<T>,
  n_i: usize,
}

pub(crate) fn forward<T: Real>(model: &Model<T>, x: Data<T>, is_train: bool) -> Result<(Data<T>, Backprop<T>)> {
  let (state, inputs) = x.into_step(model.name())?;
  if state.hiddens.rank() != 2 || inputs.rank() != 2 {
    return Err(Error::shape("lstm_step", state.hiddens.shape(), inputs.shape()))
  }
  let n_i = inputs.shape()[1];
  let joined = state.hiddens.concat(&inputs, 1)?;
  let (acts, affine) = model.layers[0].forward(Data::Floats2d(joined), is_train)?;
  let acts = acts.into_floats2d(model.name())?;
  let (state, gates) = gates_forward(acts, state.cells)?;
  let hiddens = state.hiddens.clone();
  let context = StepContext { affine: Box::new(affine), gates, n_i };
  Ok((Data::Step(state, hiddens), model.backprop(Context::LstmStep(context))))
}

/// Gradients w.r.t. the hiddens arrive twice, once as part of the next
/// state and once as the step output. Both are summed.

pub(crate) fn backprop<T: Real>(model: &mut Model<T>, context: StepContext<T>, dy: Data<T>) -> Result<Data<T>> {
  let (d_state, d_output) = dy.into_step(model.name())?;
  if d_state.hiddens.shape() != d_output.shape() {
    return Err(Error::shape("lstm_step", d_state.hiddens.shape(), d_output.shape()))
  }
  let d_hiddens = d_state.hiddens + d_output;
  let (d_acts, d_prev_cells) = gates_backward(context.gates, d_state.cells, d_hiddens)?;
  let dx = context.affine.backward(&mut model.layers[0], Data::Floats2d(d_acts))?
    .into_floats2d(model.name())?;
  let at = dx.shape()[1].checked_sub(context.n_i)
    .ok_or_else(|| Error::shape("lstm_step", dx.shape(), &dx.shape().with_dim(1, context.n_i)) )?;
  let (d_prev_hiddens, d_inputs) = dx.split(at, 1)?;
  Ok(Data::Step(RnnState { cells: d_prev_cells, hiddens: d_prev_hiddens }, d_inputs))
}


/// What the gate kernel needs for its derivative.

#[derive(Debug)]
pub(crate) struct GateContext<T: Real> {
  /// Activated gates `(batch, nO, 4)`
  gates: Tensor<T>,
  cells: Tensor<T>,
  prev_cells: Tensor<T>,
  size: usize,
}

/// Turn affine output `(batch, 4·nO)` into the next state.

fn gates_forward<T: Real>(acts: Tensor<T>, prev_cells: Tensor<T>) -> Result<(RnnState<T>, GateContext<T>)> {
  let batch = acts.shape()[0];
  let n_o = prev_cells.shape()[-1];
  let mut gates = acts.reshape(&[batch, n_o, NUM_GATES])?;
  let mut cells = Tensor::zeros(&prev_cells.shape().dims);
  let mut hiddens = Tensor::zeros(&prev_cells.shape().dims);
  let size = gates::lstm(&mut hiddens, &mut cells, &mut gates, &prev_cells)?;
  let state = RnnState { cells: cells.clone(), hiddens };
  Ok((state, GateContext { gates, cells, prev_cells, size }))
}

/// Returns gradients w.r.t. the affine output and the previous memory.

fn gates_backward<T: Real>(context: GateContext<T>, d_cells: Tensor<T>, d_hiddens: Tensor<T>) -> Result<(Tensor<T>, Tensor<T>)> {
  let GateContext { gates, cells, prev_cells, size } = context;
  let truncate = |d: Tensor<T>| if d.rank() > 0 && d.shape()[0] > size { d.range(0..size) } else { d };
  let (d_cells, d_hiddens) = (truncate(d_cells), truncate(d_hiddens));
  let mut d_gates = Tensor::zeros(&gates.shape().dims);
  let mut d_prev_cells = Tensor::zeros(&prev_cells.shape().dims);
  gates::backprop_lstm(&d_cells, &mut d_prev_cells, &mut d_gates, &d_hiddens, &gates, &cells, &prev_cells)?;
  let (batch, n_o) = (gates.shape()[0], gates.shape()[1]);
  Ok((d_gates.reshape(&[batch, n_o * NUM_GATES])?, d_prev_cells))
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::data::Padded;

  fn step_input(batch: usize, n_o: usize, n_i: usize) -> Data<f64> {
    Data::Step(
      RnnState { cells: Tensor::randn(&[batch, n_o]), hiddens: Tensor::randn(&[batch, n_o]) },
      Tensor::randn(&[batch, n_i]),
    )
  }

  #[test]
  fn dropout_is_rejected() {
    let err = lstm_step::<f32>(Some(2), Some(3), 0.1).unwrap_err();
    assert!(matches!(err, Error::NotImplemented(_)));
    assert!(lstm::<f32>(Some(2), Some(3), 2, 0.5).is_err());
  }

  #[test]
  fn affine_shape() {
    let model = lstm_step::<f32>(Some(2), Some(3), 0.0).unwrap();
    assert!(model.is_initialized());
    let affine = &model.layers()[0];
    assert_eq!(affine.dim(Dim::NO), Some(8));
    assert_eq!(affine.dim(Dim::NI), Some(5));
    assert_eq!(affine.param("W").unwrap().shape().dims, vec![8, 5]);
  }

  #[test]
  fn init_from_samples() {
    let mut model = lstm_step::<f64>(None, None, 0.0).unwrap();
    assert!(!model.is_initialized());
    let x = step_input(2, 4, 3);
    let y = step_input(2, 4, 4);
    model.initialize(Some(&x), Some(&y)).unwrap();
    assert_eq!(model.dim(Dim::NI), Some(3));
    assert_eq!(model.dim(Dim::NO), Some(4));
    assert_eq!(model.layers()[0].dim(Dim::NI), Some(7));
  }

  #[test]
  fn init_without_dims_fails() {
    let mut model = lstm_step::<f64>(Some(4), None, 0.0).unwrap();
    assert!(matches!(model.initialize(None, None), Err(Error::MissingDim { dim: Dim::NI, .. })));
  }

  #[test]
  fn output_is_new_hidden_state() {
    let model = lstm_step::<f64>(Some(4), Some(3), 0.0).unwrap();
    let (state, hiddens) = model.predict(step_input(5, 4, 3)).unwrap().into_step("test").unwrap();
    assert_eq!(state.hiddens, hiddens);
    assert_eq!(state.cells.shape().dims, vec![5, 4]);
    assert_eq!(hiddens.shape().dims, vec![5, 4]);
  }

  #[test]
  fn hidden_gradients_are_summed() {
    let mut model = lstm_step::<f64>(Some(3), Some(2), 0.0).unwrap();
    let x = step_input(2, 3, 2);
    let d_cells = Tensor::randn(&[2, 3]);
    let d_hiddens = Tensor::randn(&[2, 3]);
    let d_output = Tensor::randn(&[2, 3]);

    let (_, backprop) = model.begin_update(x.clone()).unwrap();
    let split = backprop.backward(&mut model, Data::Step(
      RnnState { cells: d_cells.clone(), hiddens: d_hiddens.clone() },
      d_output.clone(),
    )).unwrap();
    let grad_split = model.layers()[0].grad("W").unwrap().clone();

    model.zero_grads();
    let (_, backprop) = model.begin_update(x).unwrap();
    let merged = backprop.backward(&mut model, Data::Step(
      RnnState { cells: d_cells, hiddens: &d_hiddens + &d_output },
      Tensor::zeros(&[2, 3]),
    )).unwrap();

    assert!(grad_split.max_diff(model.layers()[0].grad("W").unwrap()) < 1e-12);
    let (split_state, split_x) = split.into_step("test").unwrap();
    let (merged_state, merged_x) = merged.into_step("test").unwrap();
    assert!(split_x.max_diff(&merged_x) < 1e-12);
    assert!(split_state.hiddens.max_diff(&merged_state.hiddens) < 1e-12);
    assert_eq!(split_x.shape().dims, vec![2, 2]);
    assert_eq!(split_state.cells.shape().dims, vec![2, 3]);
  }

  #[test]
  fn gradients_truncate_to_processed_rows() {
    let mut model = lstm_step::<f64>(Some(2), Some(3), 0.0).unwrap();
    let x = Data::Step(
      RnnState { cells: Tensor::randn(&[3, 2]), hiddens: Tensor::randn(&[2, 2]) },
      Tensor::randn(&[2, 3]),
    );
    let (y, backprop) = model.begin_update(x).unwrap();
    let (state, _) = y.into_step("test").unwrap();
    assert_eq!(state.cells.shape().dims, vec![3, 2]);

    let dy = Data::Step(
      RnnState { cells: Tensor::ones(&[3, 2]), hiddens: Tensor::ones(&[3, 2]) },
      Tensor::ones(&[3, 2]),
    );
    let (d_state, dx) = backprop.backward(&mut model, dy).unwrap().into_step("test").unwrap();
    assert_eq!(d_state.cells.shape().dims, vec![3, 2]);
    assert_eq!(d_state.hiddens.shape().dims, vec![2, 2]);
    assert_eq!(dx.shape().dims, vec![2, 3]);
    // Memory rows beyond the batch take no part
    assert_eq!(d_state.cells.at(&[2]), Tensor::zeros(&[2]));
    assert!(d_state.cells.at(&[0]).raw().iter().any(|&g| g != 0.0 ));
  }

  #[test]
  fn rejects_mismatched_gradients() {
    let mut model = lstm_step::<f64>(Some(3), Some(2), 0.0).unwrap();
    let (_, backprop) = model.begin_update(step_input(2, 3, 2)).unwrap();
    let dy = Data::Step(RnnState::zeros(2, 3), Tensor::zeros(&[1, 3]));
    assert!(matches!(backprop.backward(&mut model, dy), Err(Error::ShapeMismatch { .. })));
  }

  #[test]
  fn stacks_layers() {
    let model = lstm::<f32>(Some(4), Some(3), 3, 0.0).unwrap();
    assert_eq!(model.layers().len(), 3);
    assert_eq!(model.dim(Dim::NI), Some(3));
    assert_eq!(model.dim(Dim::NO), Some(4));
    assert_eq!(model.layers()[2].layers()[0].dim(Dim::NI), Some(4));
    assert_eq!(lstm::<f32>(Some(4), Some(3), 1, 0.0).unwrap().name(), "recurrent");
  }

  #[test]
  fn zero_depth_passes_through() {
    let mut model = lstm::<f64>(Some(4), Some(3), 0, 0.0).unwrap();
    assert_eq!(model.name(), "noop");
    assert!(model.layers().is_empty());
    let x = Data::Padded(Padded::from_sequences(&[Tensor::randn(&[2, 3]), Tensor::randn(&[1, 3])]).unwrap());
    let (y, backprop) = model.begin_update(x.clone()).unwrap();
    assert_eq!(y, x);
    assert_eq!(backprop.backward(&mut model, x.clone()).unwrap(), x);
    assert!(lstm::<f64>(Some(4), Some(3), 0, 0.5).is_err());
  }
}
