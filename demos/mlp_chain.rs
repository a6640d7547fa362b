// This example builds a small multi layer perceptron by composing layers
// and trains it on a toy regression task with plain gradient descent.

// Hidden widths are left open and get inferred from sample data.

use microlayer::{ chain, layers::{ affine, relu }, Data, Dim, Model, Tensor };

fn main() {
  let mut model: Model<f32> = chain![affine(Some(16), None), relu(), affine(None, None)].unwrap();

  // Fill in missing widths from samples of inputs and targets
  let x = Tensor::randn(&[32, 2]);
  let y = Tensor::zeros(&[32, 1]);
  model.initialize(Some(&Data::Floats2d(x.clone())), Some(&Data::Floats2d(y.clone()))).unwrap();
  println!("Initialized {} with nI={:?} nO={:?}", model.name(), model.dim(Dim::NI), model.dim(Dim::NO));

  let learning_rate = 0.01;

  for epoch in 0..200 {
    // Target: sum of both inputs
    let x = Tensor::randn(&[32, 2]);
    let target = Tensor::init(&[32, 1], |i| x.raw()[i * 2] + x.raw()[i * 2 + 1] );

    let (output, backprop) = model.begin_update(Data::Floats2d(x)).unwrap();
    let output = output.into_floats2d("output").unwrap();
    let error = &output - &target;
    let loss = error.mul(&error).sum() / 32.0;

    // Gradients accumulate until reset
    model.zero_grads();
    backprop.backward(&mut model, Data::Floats2d(error * (2.0 / 32.0))).unwrap();
    descend(&mut model, learning_rate);

    if epoch % 20 == 0 { println!("Epoch {epoch}: loss {loss}") }
  }
}

fn descend(model: &mut Model<f32>, learning_rate: f32) {
  for layer in model.layers_mut() {
    for name in ["W", "b"] {
      if let (Some(param), Some(grad)) = (layer.param(name), layer.grad(name)) {
        let updated = param - &(grad * learning_rate);
        layer.set_param(name, updated);
      }
    }
  }
}
