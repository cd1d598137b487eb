use rayon::prelude::*;

use crate::base::Base;
use crate::error::Result;

impl<B: Base> super::Tape<B> {
    /// Gradients at many points, one workspace per point.
    ///
    /// The tape is shared read-only across the worker threads.
    pub fn gradient_batch_par(&self, points: &[Vec<B>]) -> Result<Vec<Vec<B>>> {
        points.par_iter().map(|x| self.gradient(x)).collect()
    }

    /// Jacobian with one reverse sweep per dependent, parallelized over
    /// rows. Returns `J[i][j] = ∂y_i/∂x_j`.
    pub fn jacobian_par(&self, x: &[B]) -> Result<Vec<Vec<B>>> {
        let mut ws = self.new_workspace();
        self.forward(0, x, &mut ws)?;
        let m = self.num_dep();
        (0..m)
            .into_par_iter()
            .map(|i| {
                let weights: Vec<B> = (0..m)
                    .map(|k| if k == i { B::one() } else { B::zero() })
                    .collect();
                self.reverse(&ws, &weights)
            })
            .collect()
    }
}
