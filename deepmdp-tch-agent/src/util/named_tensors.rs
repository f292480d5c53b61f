use anyhow::Result;
use deepmdp_core::DeepMdpError;
use log::{info, trace};
use std::{collections::HashMap, path::Path};
use tch::{nn::VarStore, Device::Cpu, Tensor};

/// Named tensors gathered from several [`VarStore`]s.
///
/// A network made of more than one [`VarStore`] (e.g., an encoder and two
/// Q-heads) is written to and read from a single checkpoint file through this
/// struct. The name of each tensor is `{prefix}.{variable name}`.
#[derive(Default)]
pub struct NamedTensors {
    pub named_tensors: HashMap<String, Tensor>,
}

impl NamedTensors {
    /// Constructs an empty set of tensors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy variables of [`VarStore`] to CPU under `prefix`.
    pub fn copy_from(&mut self, prefix: &str, vs: &VarStore) {
        tch::no_grad(|| {
            for (k, v) in vs.variables().iter() {
                let v = v.detach().to(Cpu).data();
                self.named_tensors.insert(format!("{}.{}", prefix, k), v);
            }
        });
    }

    /// Copy tensors under `prefix` to [`VarStore`].
    ///
    /// Every variable of `vs` must be found.
    pub fn copy_to(&self, prefix: &str, vs: &mut VarStore) -> Result<()> {
        let mut dest = vs.variables();

        tch::no_grad(|| -> Result<()> {
            for (name, dest) in dest.iter_mut() {
                let key = format!("{}.{}", prefix, name);
                let src = self
                    .named_tensors
                    .get(&key)
                    .ok_or_else(|| DeepMdpError::MissingVariable {
                        name: key.clone(),
                        path: prefix.to_string(),
                    })?;
                dest.copy_(src);
            }
            Ok(())
        })
    }

    /// Writes the tensors to a file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let named_tensors = self.named_tensors.iter().collect::<Vec<_>>();
        Tensor::save_multi(named_tensors.as_slice(), &path)?;
        info!("Save tensors to {:?}", path.as_ref());
        for (name, _) in named_tensors.iter() {
            trace!("Save variable {}", name);
        }
        Ok(())
    }

    /// Reads tensors from a file.
    pub fn load<T: AsRef<Path>>(path: T) -> Result<Self> {
        let named_tensors = Tensor::load_multi(&path)?.into_iter().collect();
        info!("Load tensors from {:?}", path.as_ref());
        Ok(Self { named_tensors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn;
    use tempdir::TempDir;

    #[test]
    fn test_save_and_load_two_var_stores() -> Result<()> {
        let vs1 = nn::VarStore::new(Cpu);
        let _ = vs1.root().var("w", &[2], nn::Init::Const(1.5));
        let vs2 = nn::VarStore::new(Cpu);
        let _ = (vs2.root() / "fc").var("b", &[1], nn::Init::Const(-2.0));

        let mut tensors = NamedTensors::new();
        tensors.copy_from("encoder", &vs1);
        tensors.copy_from("q1", &vs2);

        let dir = TempDir::new("named_tensors")?;
        let path = dir.path().join("critic.pt");
        tensors.save(&path)?;

        let loaded = NamedTensors::load(&path)?;
        let mut vs1_ = nn::VarStore::new(Cpu);
        let _ = vs1_.root().var("w", &[2], nn::Init::Const(0.0));
        let mut vs2_ = nn::VarStore::new(Cpu);
        let _ = (vs2_.root() / "fc").var("b", &[1], nn::Init::Const(0.0));
        loaded.copy_to("encoder", &mut vs1_)?;
        loaded.copy_to("q1", &mut vs2_)?;

        assert_eq!(vs1_.variables()["w"].double_value(&[1]), 1.5);
        assert_eq!(vs2_.variables()["fc.b"].double_value(&[0]), -2.0);

        // Prefix not in the file
        assert!(loaded.copy_to("q2", &mut vs2_).is_err());
        Ok(())
    }
}
