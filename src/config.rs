//! Building layers by name from plain data.
//!
//! A [LayerConfig] tree describes a model without any code. It can be
//! stored as bytes and turned back into a live [Model] by a [Registry].

use std::collections::HashMap;

use serde::{ Serialize, Deserialize };
use tracing::debug;

use crate::{
  error::{ Error, Result },
  scalar::Real,
  model::Model,
  layers::{ chains, affine, relu, lstm_step, recurrent, lstm },
};


/// Serializable description of a layer and its sublayers.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
  /// Registered constructor name, like `"Affine.v1"`
  pub layer: String,
  pub n_o: Option<usize>,
  pub n_i: Option<usize>,
  pub depth: Option<usize>,
  pub dropout: f64,
  pub layers: Vec<LayerConfig>,
}

impl LayerConfig {
  pub fn new(layer: &str) -> Self {
    Self {
      layer: layer.to_string(),
      n_o: None,
      n_i: None,
      depth: None,
      dropout: 0.0,
      layers: vec![],
    }
  }

  pub fn n_o(mut self, n: usize) -> Self {
    self.n_o = Some(n);
    self
  }

  pub fn n_i(mut self, n: usize) -> Self {
    self.n_i = Some(n);
    self
  }

  pub fn depth(mut self, depth: usize) -> Self {
    self.depth = Some(depth);
    self
  }

  pub fn dropout(mut self, rate: f64) -> Self {
    self.dropout = rate;
    self
  }

  pub fn with(mut self, child: LayerConfig) -> Self {
    self.layers.push(child);
    self
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    Ok(postcard::to_allocvec(self)?)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    Ok(postcard::from_bytes(bytes)?)
  }

  pub fn save(&self, filename: &str) -> std::io::Result<()> {
    let bytes = self.to_bytes()
      .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err) )?;
    std::fs::write(filename, bytes)
  }

  pub fn load(filename: &str) -> std::io::Result<Self> {
    let bytes = std::fs::read(filename)?;
    Self::from_bytes(&bytes)
      .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err) )
  }
}


/// Turns a config and its already built sublayers into a model.

pub type Constructor<T> = fn(&LayerConfig, Vec<Model<T>>) -> Result<Model<T>>;


/// Named layer constructors.

pub struct Registry<T: Real> {
  constructors: HashMap<String, Constructor<T>>,
}

impl<T: Real> Registry<T> {
  /// A registry without any layers.

  pub fn empty() -> Self {
    Self { constructors: HashMap::new() }
  }

  /// Add or replace a constructor.

  pub fn register(&mut self, name: &str, constructor: Constructor<T>) {
    self.constructors.insert(name.to_string(), constructor);
  }

  pub fn get(&self, name: &str) -> Option<Constructor<T>> {
    self.constructors.get(name).copied()
  }

  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<_> = self.constructors.keys().map(|name| name.as_str() ).collect();
    names.sort();
    names
  }

  /// Build sublayers first, then hand them to the named constructor.

  pub fn resolve(&self, config: &LayerConfig) -> Result<Model<T>> {
    let constructor = self.get(&config.layer)
      .ok_or_else(|| Error::UnknownLayer(config.layer.clone()) )?;
    let layers = config.layers.iter()
      .map(|child| self.resolve(child) )
      .collect::<Result<Vec<_>>>()?;
    debug!(layer = %config.layer, sublayers = layers.len(), "resolving config");
    constructor(config, layers)
  }
}

impl<T: Real> Default for Registry<T> {
  fn default() -> Self {
    let mut registry = Self::empty();
    registry.register("chain.v0", |_, layers| chains(layers) );
    registry.register("chain.v1", |_, layers| chains(layers) );
    registry.register("Affine.v1", |config, layers| {
      no_sublayers(config, &layers)?;
      Ok(affine(config.n_o, config.n_i))
    });
    registry.register("Relu.v1", |config, layers| {
      no_sublayers(config, &layers)?;
      Ok(relu())
    });
    registry.register("LSTM_step.v1", |config, layers| {
      no_sublayers(config, &layers)?;
      lstm_step(config.n_o, config.n_i, config.dropout)
    });
    registry.register("recurrent.v1", |config, layers| {
      let mut layers = layers.into_iter();
      match (layers.next(), layers.next()) {
        (Some(step), None) => Ok(recurrent(step)),
        _ => Err(Error::InvalidConfig(format!("{} takes exactly one step layer", config.layer))),
      }
    });
    registry.register("LSTM.v1", |config, layers| {
      no_sublayers(config, &layers)?;
      lstm(config.n_o, config.n_i, config.depth.unwrap_or(1), config.dropout)
    });
    registry
  }
}

fn no_sublayers<T: Real>(config: &LayerConfig, layers: &[Model<T>]) -> Result<()> {
  if layers.is_empty() {
    Ok(())
  } else {
    Err(Error::InvalidConfig(format!("{} takes no sublayers, got {}", config.layer, layers.len())))
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{ Dim, Kind };

  fn mlp() -> LayerConfig {
    LayerConfig::new("chain.v1")
      .with(LayerConfig::new("Affine.v1").n_o(8).n_i(4))
      .with(LayerConfig::new("Relu.v1"))
      .with(LayerConfig::new("Affine.v1").n_o(2).n_i(8))
  }

  #[test]
  fn default_names() {
    let registry = Registry::<f32>::default();
    assert_eq!(registry.names(), vec!["Affine.v1", "LSTM.v1", "LSTM_step.v1", "Relu.v1", "chain.v0", "chain.v1", "recurrent.v1"]);
  }

  #[test]
  fn resolve() {
    let model = Registry::<f32>::default().resolve(&mlp()).unwrap();
    assert_eq!(model.kind(), Kind::Chain);
    assert_eq!(model.layers().len(), 3);
    assert_eq!(model.dim(Dim::NI), Some(4));
    assert_eq!(model.dim(Dim::NO), Some(2));
    assert!(model.is_initialized());
  }

  #[test]
  fn both_chain_versions() {
    let registry = Registry::<f32>::default();
    let mut config = mlp();
    let current = registry.resolve(&config).unwrap();
    config.layer = "chain.v0".to_string();
    let legacy = registry.resolve(&config).unwrap();
    assert_eq!(legacy.name(), current.name());
    assert_eq!(legacy.dim(Dim::NO), current.dim(Dim::NO));
  }

  #[test]
  fn bytes_round_trip() {
    let config = mlp();
    let bytes = config.to_bytes().unwrap();
    assert_eq!(LayerConfig::from_bytes(&bytes).unwrap(), config);
    assert!(matches!(LayerConfig::from_bytes(&bytes[..3]), Err(Error::Encoding(_))));
  }

  #[test]
  fn unknown_layer() {
    let config = LayerConfig::new("chain.v1").with(LayerConfig::new("Conv.v1"));
    let err = Registry::<f32>::default().resolve(&config).unwrap_err();
    assert!(matches!(err, Error::UnknownLayer(name) if name == "Conv.v1"));
  }

  #[test]
  fn invalid_arity() {
    let registry = Registry::<f32>::default();
    assert!(matches!(registry.resolve(&LayerConfig::new("recurrent.v1")), Err(Error::InvalidConfig(_))));
    let config = LayerConfig::new("Relu.v1").with(LayerConfig::new("Relu.v1"));
    assert!(matches!(registry.resolve(&config), Err(Error::InvalidConfig(_))));
  }

  #[test]
  fn lstm_config() {
    let config = LayerConfig::new("LSTM.v1").n_o(6).n_i(3).depth(2);
    let model = Registry::<f64>::default().resolve(&config).unwrap();
    assert_eq!(model.layers().len(), 2);
    let config = LayerConfig::new("LSTM_step.v1").n_o(6).n_i(3).dropout(0.2);
    assert!(matches!(Registry::<f64>::default().resolve(&config), Err(Error::NotImplemented(_))));
  }

  #[test]
  fn custom_constructor() {
    let mut registry = Registry::<f32>::empty();
    registry.register("Wide.v1", |_, _| Ok(affine(Some(64), None)) );
    let model = registry.resolve(&LayerConfig::new("Wide.v1")).unwrap();
    assert_eq!(model.dim(Dim::NO), Some(64));
    assert!(registry.resolve(&LayerConfig::new("Affine.v1")).is_err());
  }
}
