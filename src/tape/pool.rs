//! Parameter pool: constants and dynamic parameters addressed by index.

use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::Addr;

/// Append-only store of parameter values.
///
/// Index 0 holds a NaN placeholder referenced by the `Begin` instruction.
/// Dynamic parameters keep their declaration order so they can be re-bound
/// as a block.
#[derive(Clone, Debug)]
pub struct ParamPool<B: Base> {
    values: Vec<B>,
    is_dynamic: Vec<bool>,
    dynamic: Vec<Addr>,
}

impl<B: Base> ParamPool<B> {
    pub fn new() -> Self {
        ParamPool {
            values: vec![B::nan()],
            is_dynamic: vec![false],
            dynamic: Vec::new(),
        }
    }

    /// Intern a constant. Returns its address.
    #[inline]
    pub fn put_con_par(&mut self, value: B) -> Addr {
        self.push(value, false)
    }

    /// Declare a dynamic parameter. Returns its address.
    #[inline]
    pub fn put_dyn_par(&mut self, value: B) -> Addr {
        let addr = self.push(value, true);
        self.dynamic.push(addr);
        addr
    }

    #[inline]
    fn push(&mut self, value: B, dynamic: bool) -> Addr {
        let addr = self.values.len() as Addr;
        self.values.push(value);
        self.is_dynamic.push(dynamic);
        addr
    }

    /// # Panics
    ///
    /// Panics if `addr` is not in the pool.
    #[inline]
    pub fn value(&self, addr: Addr) -> B {
        self.values[addr as usize]
    }

    #[inline]
    pub fn is_dynamic(&self, addr: Addr) -> bool {
        self.is_dynamic[addr as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn num_dynamic(&self) -> usize {
        self.dynamic.len()
    }

    /// Current values of the dynamic parameters, in declaration order.
    pub fn dynamic_values(&self) -> Vec<B> {
        self.dynamic.iter().map(|&a| self.values[a as usize]).collect()
    }

    /// Re-bind every dynamic parameter, in declaration order.
    pub fn set_dynamic(&mut self, values: &[B]) -> Result<()> {
        if values.len() != self.dynamic.len() {
            return Err(TapeError::LengthMismatch {
                what: "dynamic parameters",
                expected: self.dynamic.len(),
                got: values.len(),
            });
        }
        for (&addr, &v) in self.dynamic.iter().zip(values) {
            self.values[addr as usize] = v;
        }
        Ok(())
    }
}

impl<B: Base> Default for ParamPool<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_occupies_index_zero() {
        let mut pool = ParamPool::<f64>::new();
        assert!(pool.value(0).is_nan());
        assert_eq!(pool.put_con_par(2.0), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn dynamic_rebinding_keeps_constants() {
        let mut pool = ParamPool::<f64>::new();
        let c = pool.put_con_par(1.5);
        let d0 = pool.put_dyn_par(10.0);
        let d1 = pool.put_dyn_par(20.0);
        pool.set_dynamic(&[-1.0, -2.0]).unwrap();
        assert_eq!(pool.value(c), 1.5);
        assert_eq!(pool.value(d0), -1.0);
        assert_eq!(pool.value(d1), -2.0);
        assert!(pool.is_dynamic(d1) && !pool.is_dynamic(c));
    }

    #[test]
    fn wrong_dynamic_length_is_rejected() {
        let mut pool = ParamPool::<f32>::new();
        pool.put_dyn_par(1.0);
        let err = pool.set_dynamic(&[]).unwrap_err();
        assert_eq!(
            err,
            TapeError::LengthMismatch {
                what: "dynamic parameters",
                expected: 1,
                got: 0
            }
        );
    }
}
