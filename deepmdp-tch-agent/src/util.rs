//! Utilities.
use crate::model::ModelBase;
use deepmdp_core::record::{Record, RecordValue};
use log::trace;
mod named_tensors;
pub use named_tensors::NamedTensors;
use anyhow::Result;
use deepmdp_core::DeepMdpError;
use tch::{nn::VarStore, Tensor};

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track<M: ModelBase>(dest: &mut M, src: &M, tau: f64) {
    let src = &mut src.get_var_store().variables();
    let dest = &mut dest.get_var_store_mut().variables();
    debug_assert_eq!(src.len(), dest.len());

    tch::no_grad(|| {
        for (name, dest) in dest.iter_mut() {
            if let Some(src) = src.get(name) {
                dest.copy_(&(tau * src + (1.0 - tau) * &*dest));
            }
        }
    });
    trace!("soft update");
}

/// Copies the variables of `src` whose names satisfy `filter` into `dest`.
///
/// Returns the number of copied variables. Fails if a selected variable of
/// `src` has no counterpart in `dest`.
pub fn copy_vars<F>(dest: &mut VarStore, src: &VarStore, filter: F) -> Result<usize>
where
    F: Fn(&str) -> bool,
{
    let src = src.variables();
    let mut dest = dest.variables();
    let mut n = 0;

    tch::no_grad(|| -> Result<()> {
        for (name, src) in src.iter().filter(|(name, _)| filter(name)) {
            let dest = dest
                .get_mut(name)
                .ok_or_else(|| DeepMdpError::MissingVariable {
                    name: name.clone(),
                    path: "destination var store".to_string(),
                })?;
            dest.copy_(src);
            n += 1;
        }
        Ok(())
    })?;

    Ok(n)
}

/// Returns the mean and standard deviation of the parameters.
///
/// Keys are `{prefix}/{variable name}_mean` and `{prefix}/{variable name}_std`.
pub fn param_stats(prefix: &str, var_store: &VarStore) -> Record {
    let mut record = Record::empty();

    for (k, v) in var_store.variables() {
        let m = v.mean(tch::Kind::Float).double_value(&[]) as f32;
        record.insert(format!("{}/{}_mean", prefix, &k), RecordValue::Scalar(m));

        let s = v.std(false).double_value(&[]) as f32;
        record.insert(format!("{}/{}_std", prefix, &k), RecordValue::Scalar(s));
    }

    record
}

/// Converts 8-bit pixel intensities to `bits`-bit values in `[-0.5, 0.5)`.
///
/// The values are quantized, dithered with uniform noise of one bin width
/// and shifted.
pub fn preprocess_obs(obs: &Tensor, bits: i64) -> Tensor {
    let bins = 2f64.powi(bits as i32);
    let obs = obs.to_kind(tch::Kind::Float);
    let obs = if bits < 8 {
        (obs / 2f64.powi(8 - bits as i32)).floor()
    } else {
        obs
    };
    let obs = obs / bins;
    let noise = obs.rand_like() / bins;
    obs + noise - 0.5
}

/// Mean squared error averaged over all elements.
pub fn mse(pred: &Tensor, target: &Tensor) -> Tensor {
    pred.mse_loss(target, tch::Reduction::Mean)
}
