//! Element-wise LSTM gate recurrence and its derivative.
//!
//! Activations are laid out `(batch, units, 4)` with the four gates of
//! each unit stored next to each other in the order [INPUT], [FORGET],
//! [OUTPUT], [CANDIDATE]. Both kernels write into buffers allocated by
//! the caller and work on independent batch rows.

use itertools::izip;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
  error::{ Error, Result },
  tensor::Tensor,
  scalar::Real,
};


pub const INPUT: usize = 0;
pub const FORGET: usize = 1;
pub const OUTPUT: usize = 2;
pub const CANDIDATE: usize = 3;
pub const NUM_GATES: usize = 4;


fn sigmoid<T: Real>(a: T) -> T {
  T::one() / (T::one() + (-a).exp())
}

fn check_rows<T: Real>(op: &'static str, a: &Tensor<T>, b: &Tensor<T>, rows: usize) -> Result<()> {
  if a.shape()[0] < rows || b.shape()[0] < rows {
    return Err(Error::shape(op, a.shape(), b.shape()))
  }
  Ok(())
}

/// Run the gate recurrence.
///
/// `gates` holds raw activations `(batch, units, 4)` on entry and the
/// activated gate values on exit, which [backprop_lstm] needs later.
/// Returns the number of batch rows that were processed.

pub fn lstm<T: Real>(
  hiddens: &mut Tensor<T>,
  cells: &mut Tensor<T>,
  gates: &mut Tensor<T>,
  prev_cells: &Tensor<T>,
) -> Result<usize> {
  if gates.rank() != 3 || gates.shape()[-1] != NUM_GATES || gates.shape()[1] != prev_cells.shape()[-1] {
    return Err(Error::shape("lstm", gates.shape(), prev_cells.shape()))
  }
  let units = gates.shape()[1];
  let size = gates.shape()[0].min(prev_cells.shape()[0]);
  check_rows("lstm", hiddens, cells, size)?;
  if units == 0 { return Ok(size) }

  let hiddens = &mut hiddens.raw_mut()[..size * units];
  let cells = &mut cells.raw_mut()[..size * units];
  let gates = &mut gates.raw_mut()[..size * units * NUM_GATES];
  let prev = &prev_cells.raw()[..size * units];

  #[cfg(feature = "rayon")]
  hiddens.par_chunks_mut(units)
    .zip(cells.par_chunks_mut(units))
    .zip(gates.par_chunks_mut(units * NUM_GATES))
    .zip(prev.par_chunks(units))
    .for_each(|(((h, c), g), p)| forward_row(h, c, g, p) );

  #[cfg(not(feature = "rayon"))]
  for (h, c, g, p) in izip!(
    hiddens.chunks_mut(units),
    cells.chunks_mut(units),
    gates.chunks_mut(units * NUM_GATES),
    prev.chunks(units),
  ) {
    forward_row(h, c, g, p);
  }

  Ok(size)
}

fn forward_row<T: Real>(hiddens: &mut [T], cells: &mut [T], gates: &mut [T], prev: &[T]) {
  for (h, c, g, &p) in izip!(hiddens, cells, gates.chunks_mut(NUM_GATES), prev) {
    g[INPUT] = sigmoid(g[INPUT]);
    g[FORGET] = sigmoid(g[FORGET]);
    g[OUTPUT] = sigmoid(g[OUTPUT]);
    g[CANDIDATE] = g[CANDIDATE].tanh();
    *c = g[FORGET] * p + g[INPUT] * g[CANDIDATE];
    *h = g[OUTPUT] * c.tanh();
  }
}

/// Derivative of [lstm].
///
/// Processes as many rows as `d_cells` has. `gates` must hold the
/// activated values produced by the forward kernel and `cells` the new
/// memory it wrote.

pub fn backprop_lstm<T: Real>(
  d_cells: &Tensor<T>,
  d_prev_cells: &mut Tensor<T>,
  d_gates: &mut Tensor<T>,
  d_hiddens: &Tensor<T>,
  gates: &Tensor<T>,
  cells: &Tensor<T>,
  prev_cells: &Tensor<T>,
) -> Result<()> {
  if d_cells.shape() != d_hiddens.shape() {
    return Err(Error::shape("backprop_lstm", d_cells.shape(), d_hiddens.shape()))
  }
  let size = d_cells.shape()[0];
  let units = d_cells.shape()[-1];
  if gates.shape()[1] != units || cells.shape()[-1] != units {
    return Err(Error::shape("backprop_lstm", gates.shape(), d_cells.shape()))
  }
  check_rows("backprop_lstm", gates, d_gates, size)?;
  check_rows("backprop_lstm", cells, prev_cells, size)?;
  check_rows("backprop_lstm", d_prev_cells, d_cells, size)?;
  if units == 0 { return Ok(()) }

  let d_cells = &d_cells.raw()[..size * units];
  let d_hiddens = &d_hiddens.raw()[..size * units];
  let d_prev = &mut d_prev_cells.raw_mut()[..size * units];
  let d_gates = &mut d_gates.raw_mut()[..size * units * NUM_GATES];
  let gates = &gates.raw()[..size * units * NUM_GATES];
  let cells = &cells.raw()[..size * units];
  let prev = &prev_cells.raw()[..size * units];

  #[cfg(feature = "rayon")]
  d_prev.par_chunks_mut(units)
    .zip(d_gates.par_chunks_mut(units * NUM_GATES))
    .zip(d_cells.par_chunks(units))
    .zip(d_hiddens.par_chunks(units))
    .zip(gates.par_chunks(units * NUM_GATES))
    .zip(cells.par_chunks(units))
    .zip(prev.par_chunks(units))
    .for_each(|((((((dp, dg), dc), dh), g), c), p)| backward_row(dp, dg, dc, dh, g, c, p) );

  #[cfg(not(feature = "rayon"))]
  for (dp, dg, dc, dh, g, c, p) in izip!(
    d_prev.chunks_mut(units),
    d_gates.chunks_mut(units * NUM_GATES),
    d_cells.chunks(units),
    d_hiddens.chunks(units),
    gates.chunks(units * NUM_GATES),
    cells.chunks(units),
    prev.chunks(units),
  ) {
    backward_row(dp, dg, dc, dh, g, c, p);
  }

  Ok(())
}

fn backward_row<T: Real>(
  d_prev: &mut [T],
  d_gates: &mut [T],
  d_cells: &[T],
  d_hiddens: &[T],
  gates: &[T],
  cells: &[T],
  prev: &[T],
) {
  let one = T::one();
  for (dp, dg, &dc, &dh, g, &c, &p) in izip!(
    d_prev,
    d_gates.chunks_mut(NUM_GATES),
    d_cells,
    d_hiddens,
    gates.chunks(NUM_GATES),
    cells,
    prev,
  ) {
    let (i, f, o, cand) = (g[INPUT], g[FORGET], g[OUTPUT], g[CANDIDATE]);
    let tanh_c = c.tanh();
    // Memory receives gradient directly and through the hidden output
    let dc = dc + dh * o * (one - tanh_c * tanh_c);
    dg[OUTPUT] = dh * tanh_c * o * (one - o);
    dg[FORGET] = dc * p * f * (one - f);
    dg[INPUT] = dc * cand * i * (one - i);
    dg[CANDIDATE] = dc * i * (one - cand * cand);
    *dp = dc * f;
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn run(acts: &Tensor<f64>, prev: &Tensor<f64>) -> (Tensor<f64>, Tensor<f64>, Tensor<f64>) {
    let mut hiddens = Tensor::zeros(&prev.shape().dims);
    let mut cells = Tensor::zeros(&prev.shape().dims);
    let mut gates = acts.clone();
    lstm(&mut hiddens, &mut cells, &mut gates, prev).unwrap();
    (hiddens, cells, gates)
  }

  #[test]
  fn zero_activations() {
    let acts = Tensor::zeros(&[2, 3, NUM_GATES]);
    let prev = Tensor::ones(&[2, 3]);
    let (hiddens, cells, gates) = run(&acts, &prev);
    // Half of the previous memory survives, candidate contributes nothing
    assert_eq!(cells, Tensor::fill(&[2, 3], 0.5));
    assert_eq!(hiddens, Tensor::fill(&[2, 3], 0.5 * 0.5f64.tanh()));
    assert_eq!(gates.at(&[0, 0]), Tensor::vec(&[0.5, 0.5, 0.5, 0.0]));
  }

  #[test]
  fn processes_smaller_batch() {
    let acts = Tensor::<f64>::randn(&[1, 2, NUM_GATES]);
    let prev = Tensor::randn(&[3, 2]);
    let mut hiddens = Tensor::zeros(&[3, 2]);
    let mut cells = Tensor::zeros(&[3, 2]);
    let mut gates = acts.clone();
    let size = lstm(&mut hiddens, &mut cells, &mut gates, &prev).unwrap();
    assert_eq!(size, 1);
    assert_eq!(hiddens.range(1..3), Tensor::zeros(&[2, 2]));
  }

  #[test]
  fn rejects_wrong_layout() {
    let mut gates = Tensor::<f32>::zeros(&[2, 3, 3]);
    let prev = Tensor::zeros(&[2, 3]);
    let mut hiddens = Tensor::zeros(&[2, 3]);
    let mut cells = Tensor::zeros(&[2, 3]);
    assert!(lstm(&mut hiddens, &mut cells, &mut gates, &prev).is_err());
  }

  #[test]
  fn derivative_matches_finite_differences() {
    let acts = Tensor::randn(&[2, 3, NUM_GATES]);
    let prev = Tensor::randn(&[2, 3]);
    let d_hiddens = Tensor::randn(&[2, 3]);
    let d_cells = Tensor::randn(&[2, 3]);
    // Scalar objective: <h, dh> + <c, dc>
    let objective = |acts: &Tensor<f64>, prev: &Tensor<f64>| {
      let (h, c, _) = run(acts, prev);
      h.mul(&d_hiddens).sum() + c.mul(&d_cells).sum()
    };

    let (_, cells, gates) = run(&acts, &prev);
    let mut d_acts = Tensor::zeros(&[2, 3, NUM_GATES]);
    let mut d_prev = Tensor::zeros(&[2, 3]);
    backprop_lstm(&d_cells, &mut d_prev, &mut d_acts, &d_hiddens, &gates, &cells, &prev).unwrap();

    let eps = 1e-6;
    for i in 0..acts.size() {
      let delta = Tensor::hot_encode(i, acts.size()).reshape(&[2, 3, NUM_GATES]).unwrap() * eps;
      let numeric = (objective(&(&acts + &delta), &prev) - objective(&(&acts - &delta), &prev)) / (2.0 * eps);
      assert!((numeric - d_acts.raw()[i]).abs() < 1e-6, "d_acts[{i}]: {numeric} vs {}", d_acts.raw()[i]);
    }
    for i in 0..prev.size() {
      let delta = Tensor::hot_encode(i, prev.size()).reshape(&[2, 3]).unwrap() * eps;
      let numeric = (objective(&acts, &(&prev + &delta)) - objective(&acts, &(&prev - &delta))) / (2.0 * eps);
      assert!((numeric - d_prev.raw()[i]).abs() < 1e-6);
    }
  }
}
