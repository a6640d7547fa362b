// This example runs a two layer LSTM over a batch of sequences of different
// lengths and back-propagates a gradient through all time steps.

// The model is described as a config first, so it could just as well be
// loaded from disk.

use microlayer::{ Data, LayerConfig, Padded, Registry, Tensor };

fn main() {
  let config = LayerConfig::new("LSTM.v1").n_o(8).n_i(3).depth(2);
  let bytes = config.to_bytes().unwrap();
  println!("Config takes {} bytes", bytes.len());

  let registry = Registry::<f64>::default();
  let mut model = registry.resolve(&LayerConfig::from_bytes(&bytes).unwrap()).unwrap();

  // Three sequences of 3 features each
  let sequences = vec![
    Tensor::randn(&[5, 3]),
    Tensor::randn(&[2, 3]),
    Tensor::randn(&[4, 3]),
  ];
  let x = Padded::from_sequences(&sequences).unwrap();
  println!("Steps per batch row: {:?}", x.size_at_t);

  let (y, backprop) = model.begin_update(Data::Padded(x)).unwrap();
  let y = y.into_padded("lstm").unwrap();
  for (i, seq) in y.to_sequences().iter().enumerate() {
    println!("Sequence {i} final hidden state: {}", seq.at(&[seq.shape()[0] - 1]));
  }

  let dy = y.with_data(Tensor::ones(&y.data.shape().dims));
  let dx = backprop.backward(&mut model, Data::Padded(dy)).unwrap();
  if let Data::Padded(dx) = dx {
    println!("Input gradient of first sequence:\n{}", dx.to_sequences()[0]);
  }

  for node in model.walk() {
    if let Some(grad) = node.grad("W") {
      println!("{} weight gradient {}", node.name(), grad.shape());
    }
  }
}
