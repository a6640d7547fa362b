use crate::{
  error::{ Error, Result },
  scalar::Real,
  shape::Shape,
  tensor::Tensor,
  data::{ Data, Padded, RnnState, Width },
  model::{ Model, Kind, Dim, Dims, Backprop, Context },
};


/// Run a step layer along the time axis of [Padded] sequences.
///
/// The state starts out as zeros. At step `t` only the `size_at_t[t]`
/// sequences that are still running are fed to the step, along with the
/// matching rows of the carried state.

pub fn recurrent<T: Real>(step: Model<T>) -> Model<T> {
  let dims = Dims::io(step.dim(Dim::NO), step.dim(Dim::NI));
  let initialized = step.is_initialized();
  let mut model = Model::new("recurrent", Kind::Recurrent, dims, vec![step]);
  if initialized {
    // Only the step has parameters
    model.mark_initialized();
  }
  model
}

pub(crate) fn init<T: Real>(model: &mut Model<T>, x: Option<&Data<T>>, y: Option<&Data<T>>) -> Result<()> {
  if let Some(n) = x.and_then(|x| x.width() ) {
    model.set_dim(Dim::NI, n)?;
  }
  if let Some(n) = y.and_then(|y| y.width() ) {
    model.set_dim(Dim::NO, n)?;
  }
  let (n_o, n_i) = (model.dim(Dim::NO), model.dim(Dim::NI));
  let step = &mut model.layers[0];
  if let Some(n) = n_o { step.set_dim(Dim::NO, n)? }
  if let Some(n) = n_i { step.set_dim(Dim::NI, n)? }
  step.initialize(None, None)?;
  let (n_o, n_i) = (step.dim(Dim::NO), step.dim(Dim::NI));
  if let Some(n) = n_o { model.set_dim(Dim::NO, n)? }
  if let Some(n) = n_i { model.set_dim(Dim::NI, n)? }
  Ok(())
}


#[derive(Debug)]
pub(crate) struct SequenceContext<T: Real> {
  steps: Vec<Backprop<T>>,
  layout: Padded<T>,
  batch: usize,
}

pub(crate) fn forward<T: Real>(model: &Model<T>, x: Data<T>, is_train: bool) -> Result<(Data<T>, Backprop<T>)> {
  let padded = x.into_padded(model.name())?;
  let n_o = model.get_dim(Dim::NO)?;
  let step = &model.layers[0];
  let shape = padded.data.shape();
  if shape.rank() != 3 || padded.size_at_t.len() != shape[0] {
    return Err(Error::shape("recurrent", shape, &Shape::new(&[padded.size_at_t.len(), 0, 0])))
  }
  let (steps, batch) = (shape[0], shape[1]);
  let mut state = RnnState::zeros(batch, n_o);
  let mut output = Tensor::zeros(&[steps, batch, n_o]);
  let mut callbacks = Vec::with_capacity(steps);
  for (t, &size) in padded.size_at_t.iter().enumerate() {
    if size > state.hiddens.shape()[0] {
      return Err(Error::shape("recurrent", state.hiddens.shape(), &state.hiddens.shape().with_dim(0, size)))
    }
    let state_t = RnnState { cells: state.cells.range(0..size), hiddens: state.hiddens.range(0..size) };
    let x_t = padded.data.at(&[t]).range(0..size);
    let (y, callback) = step.forward(Data::Step(state_t, x_t), is_train)?;
    let (next, hiddens) = y.into_step(step.name())?;
    output.assign_at(&[t], &hiddens);
    callbacks.push(callback);
    state = next;
  }
  let y = padded.with_data(output);
  let layout = padded.with_data(Tensor::zeros(&[0]));
  Ok((Data::Padded(y), model.backprop(Context::Recurrent(SequenceContext { steps: callbacks, layout, batch }))))
}

/// Walk back through time. The state gradient handed to step `t` comes
/// from step `t + 1`, padded with zeros for sequences that ended at `t`.

pub(crate) fn backprop<T: Real>(model: &mut Model<T>, context: SequenceContext<T>, dy: Data<T>) -> Result<Data<T>> {
  let dy = dy.into_padded(model.name())?;
  let n_o = model.get_dim(Dim::NO)?;
  let n_i = model.get_dim(Dim::NI)?;
  let SequenceContext { steps: callbacks, layout, batch } = context;
  let steps = callbacks.len();
  let expected = Shape::new(&[steps, batch, n_o]);
  if dy.data.shape() != &expected {
    return Err(Error::shape("recurrent", dy.data.shape(), &expected))
  }
  let step = &mut model.layers[0];
  let mut dx = Tensor::zeros(&[steps, batch, n_i]);
  let mut d_state = RnnState::zeros(0, n_o);
  for (t, callback) in callbacks.into_iter().enumerate().rev() {
    let size = layout.size_at_t[t];
    let d_state_t = RnnState { cells: pad_rows(&d_state.cells, size), hiddens: pad_rows(&d_state.hiddens, size) };
    let d_output = dy.data.at(&[t]).range(0..size);
    let (d_prev, d_x) = callback.backward(step, Data::Step(d_state_t, d_output))?
      .into_step(step.name())?;
    dx.assign_at(&[t], &d_x);
    d_state = d_prev;
  }
  Ok(Data::Padded(layout.with_data(dx)))
}

/// Extend to `rows` rows with zeros.

fn pad_rows<T: Real>(x: &Tensor<T>, rows: usize) -> Tensor<T> {
  let mut out = Tensor::zeros(&[rows, x.shape()[-1]]);
  out.assign_range(0, x);
  out
}
