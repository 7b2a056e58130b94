//! Learned Parameters
//!
//! A [`Param`] is what the host framework sees of a layer's learned state:
//! the values (`data`), a same-shaped gradient buffer (`diff`), and a
//! trainable flag the external optimizer consults before updating it.
//!
//! The layer owns its parameters. The optimizer gets a mutable borrow through
//! `params_mut()` and writes in place between training steps.

use crate::tensor::Tensor;

/// One learned parameter blob
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Identifier used in logs and by the host (`"weight"`, `"bias"`)
    pub name: String,
    /// Current values
    pub data: Tensor,
    /// Gradient buffer, same shape as `data`
    pub diff: Tensor,
    /// Whether the optimizer should update this parameter
    pub trainable: bool,
}

impl Param {
    /// Wrap values as a trainable parameter with a zeroed gradient buffer
    pub fn new(name: impl Into<String>, data: Tensor) -> Self {
        let diff = Tensor::zeros(data.shape.clone());
        Self {
            name: name.into(),
            data,
            diff,
            trainable: true,
        }
    }

    /// Allocate a zero-valued parameter of the given shape
    pub fn zeros(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self::new(name, Tensor::zeros(shape))
    }

    pub fn shape(&self) -> &[usize] {
        &self.data.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_param_is_trainable_with_zero_diff() {
        let p = Param::new("weight", Tensor::full(vec![2, 3], 1.0));
        assert!(p.trainable);
        assert_eq!(p.diff.shape, vec![2, 3]);
        assert!(p.diff.data.iter().all(|&g| g == 0.0));
        assert_eq!(p.shape(), &[2, 3]);
    }
}
