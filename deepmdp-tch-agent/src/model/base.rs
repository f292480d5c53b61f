//! Definition of interfaces of neural networks.
use anyhow::Result;
use log::{info, trace};
use std::path::Path;
use tch::{nn, nn::VarStore, Device};

/// Base interface of networks owning a [`VarStore`].
pub trait ModelBase {
    /// Returns `var_store`.
    fn get_var_store(&self) -> &nn::VarStore;

    /// Returns `var_store` as mutable reference.
    fn get_var_store_mut(&mut self) -> &mut nn::VarStore;

    /// Save parameters of the neural network.
    fn save<T: AsRef<Path>>(&self, path: T) -> Result<()>;

    /// Load parameters of the neural network.
    fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()>;
}

/// Neural network model that can be initialized with [`VarStore`] and configuration.
///
/// The purpose of this trait is for modularity of neural network models.
/// Structs implementing this trait can be initialized with a given [`VarStore`]
/// and cloned with another one, which is how target networks and tied
/// encoders are created.
///
/// [`VarStore`]: https://docs.rs/tch/0.16.0/tch/nn/struct.VarStore.html
pub trait SubModel {
    /// Configuration from which [`SubModel`] is constructed.
    type Config;

    /// Input of the [`SubModel`].
    type Input;

    /// Output of the [`SubModel`].
    type Output;

    /// Builds [`SubModel`] with [`VarStore`] and [`SubModel::Config`].
    fn build(var_store: &VarStore, config: Self::Config) -> Self;

    /// Clones [`SubModel`] with [`VarStore`].
    ///
    /// Parameters are not copied, only the structure.
    fn clone_with_var_store(&self, var_store: &VarStore) -> Self;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Self::Output;
}

/// A [`SubModel`] together with the [`VarStore`] holding its parameters.
///
/// Every network of the agent lives in its own [`VarStore`], so that
/// optimizers, soft updates and checkpoints can address them separately.
pub struct Network<M: SubModel> {
    var_store: nn::VarStore,
    model: M,
}

impl<M: SubModel> Network<M> {
    /// Builds the network on a fresh [`VarStore`] on `device`.
    pub fn build(config: M::Config, device: Device) -> Self {
        let var_store = nn::VarStore::new(device);
        let model = M::build(&var_store, config);
        Self { var_store, model }
    }

    /// Performs forward computation.
    pub fn forward(&self, input: &M::Input) -> M::Output {
        self.model.forward(input)
    }

    /// Returns the inner model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the device of the parameters.
    pub fn device(&self) -> Device {
        self.var_store.device()
    }

    /// Creates a structurally identical network initialized with a copy of the
    /// parameters of `self`.
    pub fn try_clone(&self) -> Result<Self> {
        let mut var_store = nn::VarStore::new(self.var_store.device());
        let model = self.model.clone_with_var_store(&var_store);
        var_store.copy(&self.var_store)?;
        Ok(Self { var_store, model })
    }
}

impl<M: SubModel> ModelBase for Network<M> {
    fn get_var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    fn get_var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.var_store
    }

    fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.var_store.save(&path)?;
        info!("Save network to {:?}", path.as_ref());
        for (name, _) in self.var_store.variables().iter() {
            trace!("Save variable {}", name);
        }
        Ok(())
    }

    fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.var_store.load(&path)?;
        info!("Load network from {:?}", path.as_ref());
        Ok(())
    }
}
