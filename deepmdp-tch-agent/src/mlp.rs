//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
pub use base::Mlp;
pub use config::MlpConfig;
pub use mlp2::Mlp2;
use tch::nn;

/// Hidden layers of an MLP, each followed by an optional layer norm and ReLU.
fn mlp(prefix: &str, var_store: &nn::VarStore, config: &MlpConfig) -> nn::Sequential {
    let mut seq = nn::seq();
    let mut in_dim = config.in_dim;
    let p = &(var_store.root() / "mlp");

    for (i, &n) in config.units.iter().enumerate() {
        seq = seq.add(nn::linear(
            p / format!("{}{}", prefix, i),
            in_dim,
            n,
            Default::default(),
        ));
        if config.layer_norm {
            seq = seq.add(nn::layer_norm(
                p / format!("norm{}", i),
                vec![n],
                Default::default(),
            ));
        }
        seq = seq.add_fn(|x| x.relu());
        in_dim = n;
    }

    seq
}
