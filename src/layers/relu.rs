use crate::{
  error::Result,
  scalar::Real,
  tensor::Tensor,
  data::Data,
  model::{ Model, Kind, Dims, Backprop, Context },
};


/// Rectified linear activation.
///
/// Declares no dimensions, so dimension inference stops here when
/// walking a composite backwards.

pub fn relu<T: Real>() -> Model<T> {
  Model::new("relu", Kind::Relu, Dims::none(), vec![])
}

pub(crate) fn forward<T: Real>(model: &Model<T>, x: Data<T>) -> Result<(Data<T>, Backprop<T>)> {
  let x = x.into_floats2d(model.name())?;
  let mask = x.vectorize(|a| if a > T::zero() { T::one() } else { T::zero() } );
  Ok((Data::Floats2d(x.relu()), model.backprop(Context::Relu(mask))))
}

pub(crate) fn backprop<T: Real>(model: &mut Model<T>, mask: Tensor<T>, dy: Data<T>) -> Result<Data<T>> {
  let dy = dy.into_floats2d(model.name())?;
  Ok(Data::Floats2d(dy * mask))
}
