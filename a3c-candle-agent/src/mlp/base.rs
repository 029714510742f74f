use super::{Activation, MlpConfig};
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{Init, Linear, Module, VarBuilder};

/// Returns linear layers `ln0, ln1, ...` mapping `in_dim` through `units` to `out_dim`.
fn create_linear_layers(prefix: &str, vb: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    dims.push(config.out_dim);
    let vb = vb.pp(prefix);
    let init_w = Init::Randn {
        mean: 0.0,
        stdev: config.init_std,
    };

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| {
            let (in_dim, out_dim) = (w[0], w[1]);
            let vb = vb.pp(format!("ln{}", i));
            let ws = vb.get_with_hints((out_dim, in_dim), "weight", init_w)?;
            let bs = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
            Ok(Linear::new(ws, Some(bs)))
        })
        .collect()
}

/// Multilayer perceptron.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

impl Mlp {
    fn activate(&self, xs: Tensor) -> Result<Tensor> {
        Ok(match self.config.activation {
            Activation::ReLU => xs.relu()?,
            Activation::ReLU6 => xs.clamp(0f32, 6f32)?,
        })
    }
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let mut xs = xs.to_device(&self.device)?;
        let n_layers = self.layers.len();

        for layer in self.layers[..n_layers - 1].iter() {
            xs = self.activate(layer.forward(&xs)?)?;
        }

        Ok(self.layers[n_layers - 1].forward(&xs)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let layers = create_linear_layers("mlp", vb, &config)?;

        Ok(Self {
            config,
            device,
            layers,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_mlp_shapes_and_init() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = Mlp::build(vb.pp("pi"), MlpConfig::new(4, vec![16], 2))?;

        let xs = Tensor::zeros((3, 4), DType::F32, &Device::Cpu)?;
        let ys = mlp.forward(&xs)?;
        assert_eq!(ys.dims(), &[3, 2]);

        // zero input and zero biases
        let ys = ys.flatten_all()?.to_vec1::<f32>()?;
        assert!(ys.iter().all(|y| *y == 0.0));

        let names = {
            let data = varmap.data().lock().unwrap();
            let mut names = data.keys().cloned().collect::<Vec<_>>();
            names.sort();
            names
        };
        assert_eq!(
            names,
            vec![
                "pi.mlp.ln0.bias",
                "pi.mlp.ln0.weight",
                "pi.mlp.ln1.bias",
                "pi.mlp.ln1.weight"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_relu6_clamps() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(1, vec![1], 1);
        let mlp = Mlp::build(vb, config)?;
        let xs = Tensor::new(&[-2f32, 3.0, 10.0], &Device::Cpu)?;
        let ys = mlp.activate(xs)?.to_vec1::<f32>()?;
        assert_eq!(ys, vec![0.0, 3.0, 6.0]);
        Ok(())
    }
}
