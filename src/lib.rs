//! Composable differentiable layers for CPU.
//! Tiny. Few dependencies. Runs on stable Rust.
//!
//! # Features
//!
//! - **Uniform models** — Every layer, from a single affine transform to a
//! stack of recurrent cells, is a [Model] with named dimensions, parameters,
//! gradients and sublayers.
//!
//! - **Composition** — [chain](fn@layers::chain) pipes the output of one layer into the
//! next. Composing a composite again extends it instead of nesting.
//!
//! - **Shape inference** — Layers may leave their widths open. Passing sample data
//! to [Model::initialize] fills them in from both ends of a pipeline.
//!
//! - **One-shot backprop** — A forward pass in training mode hands out a
//! [Backprop] value that maps output gradients to input gradients exactly once,
//! accumulating parameter gradients on the way.
//!
//! - **LSTM** — A recurrent cell with fused gate kernels, plus a driver that runs
//! any step layer over padded batches of variable length sequences.
//!
//! - **Configs** — Models can be described as plain [LayerConfig] data, saved as
//! bytes and rebuilt through a [Registry] of named constructors.
//!
//! # Examples
//!
//! Composing, running and back-propagating a small network:
//! ```
//! use microlayer::{ chain, layers::{ affine, relu }, Data, Tensor };
//!
//! let mut model = chain![affine::<f32>(Some(8), Some(4)), relu(), affine(Some(2), Some(8))].unwrap();
//!
//! let x = Data::Floats2d(Tensor::randn(&[16, 4]));
//! let (y, backprop) = model.begin_update(x).unwrap();
//! assert_eq!(y.as_floats2d().unwrap().shape().dims, vec![16, 2]);
//!
//! let dx = backprop.backward(&mut model, Data::Floats2d(Tensor::ones(&[16, 2]))).unwrap();
//! assert_eq!(dx.as_floats2d().unwrap().shape().dims, vec![16, 4]);
//! ```
//!
//! Widths left open get inferred from samples:
//! ```
//! use microlayer::{ chain, layers::{ affine, relu }, Data, Dim, Tensor };
//!
//! let mut model = chain![affine::<f32>(Some(8), None), relu(), affine(None, None)].unwrap();
//! let x = Data::Floats2d(Tensor::zeros(&[3, 5]));
//! let y = Data::Floats2d(Tensor::zeros(&[3, 2]));
//! model.initialize(Some(&x), Some(&y)).unwrap();
//! assert_eq!(model.dim(Dim::NI), Some(5));
//! assert_eq!(model.dim(Dim::NO), Some(2));
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for more example code.
//!
//!
//! # Optional features
//!
//! Some features can be toggled in your `Cargo.toml`.
//!
//! - `unsafe` *(default)* — Accelerated matrix math using [matrixmultiply] crate.
//! - `rayon` — Process batch rows of the LSTM gate kernels in parallel.

mod internal;
mod shape;
mod tensor;
mod data;
mod model;
mod error;

pub mod scalar;
pub mod layers;
pub mod config;

pub use shape::Shape;
pub use tensor::{ Tensor, gates };
pub use data::{ Data, Padded, Ragged, RnnState, Width };
pub use model::{ Model, Backprop, Dim, Dims, Kind };
pub use error::{ Error, Result };
pub use config::{ LayerConfig, Registry };
