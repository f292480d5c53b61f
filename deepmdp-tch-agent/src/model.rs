//! Interface of neural networks.
mod base;
pub use base::{ModelBase, Network, SubModel};
