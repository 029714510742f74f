//! Utilities.
use a3c_core::error::A3cError;
use anyhow::Result;
use candle_core::{Tensor, Var};
use candle_nn::VarMap;
use std::{collections::HashMap, sync::MutexGuard};
mod named_tensors;
pub use named_tensors::NamedTensors;

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Interface for handling input dimensions.
pub trait InDim {
    /// Returns the input dimension.
    fn get_in_dim(&self) -> usize;
}

/// Locks the variables of a [`VarMap`].
pub(crate) fn lock_vars(varmap: &VarMap) -> Result<MutexGuard<'_, HashMap<String, Var>>> {
    varmap
        .data()
        .lock()
        .map_err(|_| A3cError::LockPoisoned("varmap").into())
}

/// Returns a description of the shape of a tensor for error messages.
pub(crate) fn shape_str(t: &Tensor) -> String {
    format!("{:?}", t.dims())
}

/// Overwrites variables of `dest` with those of `src`.
///
/// Variables are identified by their names.
pub fn copy_vars(dest: &VarMap, src: &VarMap) -> Result<()> {
    let src = NamedTensors::copy_from(src)?;
    src.copy_to(dest)
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::Init;

    fn varmap_with(values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        vm.get((values.len(),), "var1", Init::Const(0.0), DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(values, (values.len(),), &Device::Cpu)?;
        lock_vars(&vm)?.get("var1").unwrap().set(&t)?;
        Ok(vm)
    }

    #[test]
    fn test_copy_vars() -> Result<()> {
        let src = varmap_with(&[1.0, 2.0, 3.0])?;
        let dest = varmap_with(&[4.0, 5.0, 6.0])?;
        copy_vars(&dest, &src)?;

        let t = lock_vars(&dest)?.get("var1").unwrap().as_tensor().to_vec1::<f32>()?;
        assert_eq!(t, vec![1.0, 2.0, 3.0]);

        // the source is not aliased
        lock_vars(&src)?
            .get("var1")
            .unwrap()
            .set(&Tensor::zeros(3, DType::F32, &Device::Cpu)?)?;
        let t = lock_vars(&dest)?.get("var1").unwrap().as_tensor().to_vec1::<f32>()?;
        assert_eq!(t, vec![1.0, 2.0, 3.0]);
        Ok(())
    }
}
