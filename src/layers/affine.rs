use crate::{
  error::Result,
  scalar::Real,
  tensor::Tensor,
  data::{ Data, Width },
  model::{ Model, Kind, Dim, Dims, Backprop, Context },
};


/// Fully connected layer `Y = X·Wᵀ + b`, with `W` of shape `(nO, nI)`.
///
/// Weights are allocated right away if both widths are given, otherwise
/// when the layer gets initialized.

pub fn affine<T: Real>(n_o: Option<usize>, n_i: Option<usize>) -> Model<T> {
  let mut model = Model::new("affine", Kind::Affine, Dims::io(n_o, n_i), vec![]);
  if let (Some(n_o), Some(n_i)) = (n_o, n_i) {
    allocate(&mut model, n_o, n_i);
  }
  model
}

fn allocate<T: Real>(model: &mut Model<T>, n_o: usize, n_i: usize) {
  if !model.has_param("W") {
    model.set_param("W", Tensor::glorot_uniform(&[n_o, n_i]));
  }
  if !model.has_param("b") {
    model.set_param("b", Tensor::zeros(&[n_o]));
  }
}

pub(crate) fn init<T: Real>(model: &mut Model<T>, x: Option<&Data<T>>, y: Option<&Data<T>>) -> Result<()> {
  if let Some(n) = x.and_then(|x| x.width() ) {
    model.set_dim(Dim::NI, n)?;
  }
  if let Some(n) = y.and_then(|y| y.width() ) {
    model.set_dim(Dim::NO, n)?;
  }
  let n_o = model.get_dim(Dim::NO)?;
  let n_i = model.get_dim(Dim::NI)?;
  allocate(model, n_o, n_i);
  Ok(())
}

pub(crate) fn forward<T: Real>(model: &Model<T>, x: Data<T>) -> Result<(Data<T>, Backprop<T>)> {
  let x = x.into_floats2d(model.name())?;
  let weights = model.get_param("W")?;
  let bias = model.get_param("b")?;
  let y = x.mm(&weights.transpose())? + bias;
  Ok((Data::Floats2d(y), model.backprop(Context::Affine(x))))
}

pub(crate) fn backprop<T: Real>(model: &mut Model<T>, x: Tensor<T>, dy: Data<T>) -> Result<Data<T>> {
  let dy = dy.into_floats2d(model.name())?;
  model.inc_grad("W", &dy.transpose().mm(&x)?)?;
  model.inc_grad("b", &dy.sum_rows())?;
  let dx = dy.mm(model.get_param("W")?)?;
  Ok(Data::Floats2d(dx))
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;

  fn fixed() -> Model<f64> {
    let mut model = affine(Some(2), Some(3));
    model.set_param("W", Tensor::new(&[2, 3], vec![1.0, 0.0, -1.0, 0.5, 2.0, 1.0]));
    model.set_param("b", Tensor::vec(&[0.5, -1.0]));
    model
  }

  #[test]
  fn allocates_when_dims_known() {
    let model = affine::<f32>(Some(4), Some(3));
    assert_eq!(model.param("W").unwrap().shape().dims, vec![4, 3]);
    assert_eq!(model.param("b"), Some(&Tensor::zeros(&[4])));
    assert!(affine::<f32>(Some(4), None).param("W").is_none());
  }

  #[test]
  fn forward() {
    let model = fixed();
    let x = Tensor::new(&[2, 3], vec![1.0, 2.0, 3.0, 0.0, 1.0, 0.0]);
    let y = model.predict(Data::Floats2d(x)).unwrap();
    assert_eq!(y, Data::Floats2d(Tensor::new(&[2, 2], vec![-1.5, 6.5, 0.5, 1.0])));
  }

  #[test]
  fn backward_accumulates() {
    let mut model = fixed();
    let x = Tensor::new(&[2, 3], vec![1.0, 2.0, 3.0, 0.0, 1.0, 0.0]);
    let dy = Tensor::new(&[2, 2], vec![1.0, 0.0, 0.0, 1.0]);
    for _ in 0..2 {
      let (_, backprop) = model.begin_update(Data::Floats2d(x.clone())).unwrap();
      let dx = backprop.backward(&mut model, Data::Floats2d(dy.clone())).unwrap();
      assert_eq!(dx, Data::Floats2d(Tensor::new(&[2, 3], vec![1.0, 0.0, -1.0, 0.5, 2.0, 1.0])));
    }
    assert_eq!(model.grad("W"), Some(&Tensor::new(&[2, 3], vec![2.0, 4.0, 6.0, 0.0, 2.0, 0.0])));
    assert_eq!(model.grad("b"), Some(&Tensor::vec(&[2.0, 2.0])));
  }

  #[test]
  fn init_from_samples() {
    let mut model = affine::<f32>(None, None);
    let x = Data::Floats2d(Tensor::zeros(&[5, 7]));
    let y = Data::Floats2d(Tensor::zeros(&[5, 2]));
    model.initialize(Some(&x), Some(&y)).unwrap();
    assert_eq!(model.param("W").unwrap().shape().dims, vec![2, 7]);
  }

  #[test]
  fn init_without_width_fails() {
    let mut model = affine::<f32>(Some(2), None);
    let err = model.initialize(None, None).unwrap_err();
    assert!(matches!(err, Error::MissingDim { dim: Dim::NI, .. }));
    assert!(model.predict(Data::Floats2d(Tensor::zeros(&[1, 3]))).is_err());
  }

  #[test]
  fn rejects_other_data() {
    let model = fixed();
    let err = model.predict(Data::List(vec![])).unwrap_err();
    assert!(matches!(err, Error::UnexpectedData { expected: "Floats2d", .. }));
  }
}
