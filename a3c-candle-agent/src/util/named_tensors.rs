use super::{lock_vars, shape_str};
use a3c_core::error::A3cError;
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor};
use candle_nn::VarMap;
use std::collections::HashMap;

/// Tensors keyed by the names of the variables of a [`VarMap`].
///
/// Used to move parameter values or gradients between models that have the same parameter
/// structure but different [`VarMap`]s. The tensors are detached copies and do not alias the
/// storage of any variable.
#[derive(Clone, Debug, Default)]
pub struct NamedTensors {
    pub named_tensors: HashMap<String, Tensor>,
}

impl NamedTensors {
    /// Copies the values of the variables of a [`VarMap`].
    pub fn copy_from(vm: &VarMap) -> Result<Self> {
        let vars = lock_vars(vm)?;
        let named_tensors = vars
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.as_tensor().copy()?.detach())))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { named_tensors })
    }

    /// Copies the gradients of all variables of a [`VarMap`] from a [`GradStore`].
    ///
    /// Fails with [`A3cError::MissingGradient`] if a variable does not have a gradient.
    pub fn from_grads(vm: &VarMap, grads: &GradStore) -> Result<Self> {
        let vars = lock_vars(vm)?;
        let named_tensors = vars
            .iter()
            .map(|(k, v)| match grads.get(v.as_tensor()) {
                Some(g) => Ok((k.clone(), g.copy()?.detach())),
                None => Err(A3cError::MissingGradient(k.clone()).into()),
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { named_tensors })
    }

    /// Overwrites the variables of a [`VarMap`] with the tensors.
    ///
    /// Every variable must have a tensor of the same shape.
    pub fn copy_to(&self, vm: &VarMap) -> Result<()> {
        let vars = lock_vars(vm)?;
        for (name, dest) in vars.iter() {
            let src = self.check(name, dest.as_tensor())?;
            dest.set(src)?;
        }
        Ok(())
    }

    /// Returns the tensor of `name` if it has the same shape as `like`.
    pub fn check(&self, name: &str, like: &Tensor) -> Result<&Tensor> {
        let t = self
            .named_tensors
            .get(name)
            .ok_or_else(|| A3cError::MissingGradient(name.to_string()))?;
        if t.dims() != like.dims() {
            return Err(A3cError::ShapeMismatch {
                expected: format!("{} {}", name, shape_str(like)),
                actual: shape_str(t),
            }
            .into());
        }
        Ok(t)
    }

    /// Returns the tensor of `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.named_tensors.get(name)
    }

    /// Number of tensors.
    pub fn len(&self) -> usize {
        self.named_tensors.len()
    }

    /// Returns `true` if there is no tensor.
    pub fn is_empty(&self) -> bool {
        self.named_tensors.is_empty()
    }
}
