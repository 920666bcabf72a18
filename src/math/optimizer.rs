// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Iteration driver of the egomotion Newton solver.
//!
//! The solver state holds the current motion and the best one seen so far.
//! Each step is a Newton step on the sphere of directions times R3.
//! Iterations stop on a small residual change or an iteration cap.

/// Decision taken after each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continue {
    /// Stop iterations.
    Stop,
    /// Continue iterations.
    Forward,
}

/// State of an iterative minimization.
///
/// * `Observations`: fixed data of the problem, sphere flows for egomotion.
/// * `EvalState`: a candidate model with its residual,
///   kept or discarded by `stop_criterion`.
/// * `Model`: the optimized unknowns, linear and angular velocities for egomotion.
/// * `Error`: why a step could not be computed, a failed SVD solve for egomotion.
pub trait OptimizerState<Observations, EvalState, Model, Error>
where
    Self: std::marker::Sized,
{
    /// State at the initial model, with its residual evaluated.
    fn init(obs: &Observations, model: Model) -> Self;

    /// Candidate model of the next iteration.
    /// An error stops `iterative_solve`, which returns it.
    fn step(&self) -> Result<Model, Error>;

    /// Residual of a candidate model.
    fn eval(&self, obs: &Observations, new_model: Model) -> EvalState;

    /// Fold the evaluated candidate into the state
    /// and decide whether to keep iterating.
    fn stop_criterion(self, nb_iter: usize, eval_state: EvalState) -> (Self, Continue);

    /// Iterate `step`, `eval` and `stop_criterion` from `initial_model`.
    /// Returns the final state and the number of iterations done.
    fn iterative_solve(obs: &Observations, initial_model: Model) -> Result<(Self, usize), Error> {
        let mut state = Self::init(obs, initial_model);
        let mut nb_iter = 0;
        loop {
            nb_iter += 1;
            let new_model = state.step()?;
            let eval_state = state.eval(obs, new_model);
            let (kept_state, continuation) = state.stop_criterion(nb_iter, eval_state);
            state = kept_state;
            if continuation == Continue::Stop {
                return Ok((state, nb_iter));
            }
        }
    }
}
