// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Egomotion (linear and angular velocity) from optical flow on the sphere.
//!
//! For a camera moving with linear velocity `v` and angular velocity `ω`,
//! a scene point with bearing `η` and inverse depth `λ > 0` has a sphere flow
//!
//! ```text
//! φ = -ω × η - λ P(η) v
//! ```
//!
//! where `P(η)` projects onto the tangent plane at `η`.
//! Depths being unknown, only the direction `ŵ` of `v` is observable:
//! `(φ + ω × η) × η` must be orthogonal to `ŵ` for every flow.
//! The squared violations of that constraint are minimized with Newton steps,
//! `ŵ` moving on the unit sphere and `ω` in R3.
//! Finally, the sign of `v` is chosen so that most points have a positive depth.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::core::landmark::Landmark;
use crate::core::sphere_flow::{self, PlaneFlow, SphereFlow};
use crate::math::optimizer::{Continue, OptimizerState};
use crate::math::{s2, so3};
use crate::misc::type_aliases::{Float, Mat3, Mat6, Vec3, Vec6};

/// Under this norm, the linear velocity is not used in the angular velocity initialization.
const LINEAR_VELOCITY_MIN_NORM: Float = 1e-4;

/// Singular values smaller than this fraction of the largest one are treated as zero.
const SVD_RELATIVE_EPSILON: Float = 1e-12;

/// Configuration of the egomotion optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Iterations stop when the residual changes by less than this between two iterations.
    pub convergence_threshold: Float,
    /// Maximum number of Newton iterations. At least one iteration is always done.
    pub max_iterations: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            convergence_threshold: 1e-8,
            max_iterations: 50,
        }
    }
}

/// Linear and angular velocity of the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    /// Linear velocity. Only its direction is estimated, its norm is kept.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
}

/// Result of an egomotion estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityEstimate {
    /// Estimated linear velocity (up to scale).
    pub linear_velocity: Vec3,
    /// Estimated angular velocity.
    pub angular_velocity: Vec3,
    /// Residual of the best iteration.
    pub residual: Float,
    /// Iteration at which the best residual was reached.
    pub optimisation_steps: usize,
    /// Number of sphere flows used.
    pub feature_count: usize,
}

impl VelocityEstimate {
    /// Flows predicted by the estimated motion at the given bearings.
    ///
    /// The inverse depth of each point is the one best explaining its observed flow.
    pub fn predicted_flows(&self, flows: &[SphereFlow]) -> Vec<SphereFlow> {
        let w = &self.angular_velocity;
        flows
            .iter()
            .map(|f| {
                let eta = &f.bearing;
                let eta_vel = s2::project(eta, &self.linear_velocity);
                let rotation_free = f.flow + w.cross(eta);
                let eta_vel_2 = eta_vel.norm_squared();
                let inverse_depth = if eta_vel_2 > 0.0 {
                    -eta_vel.dot(&rotation_free) / eta_vel_2
                } else {
                    0.0
                };
                SphereFlow {
                    bearing: *eta,
                    flow: -w.cross(eta) - inverse_depth * eta_vel,
                }
            })
            .collect()
    }

    /// Same as `predicted_flows` but expressed in the normalized image plane.
    /// Bearings parallel to the image plane are skipped.
    pub fn predicted_flows_norm(&self, flows: &[SphereFlow]) -> Vec<PlaneFlow> {
        self.predicted_flows(flows)
            .iter()
            .filter_map(sphere_flow::to_normalized_plane)
            .collect()
    }
}

/// Estimate egomotion from the flows of tracked landmarks over a time step `dt`.
///
/// Landmarks observed in less than two frames are ignored.
/// Without initial linear velocity, the camera is assumed to move along its optical axis.
/// Without initial angular velocity, one is derived by least squares.
pub fn estimate_egomotion(
    config: &Config,
    landmarks: &[Landmark],
    dt: Float,
    init_linear_velocity: Option<Vec3>,
    init_angular_velocity: Option<Vec3>,
) -> VelocityEstimate {
    let flows = sphere_flow::from_landmarks(landmarks, dt);
    estimate_from_flows(
        config,
        &flows,
        init_linear_velocity,
        init_angular_velocity,
    )
}

/// Estimate egomotion from sphere flows.
///
/// Never fails: degenerate inputs (no flow, a single flow, coincident bearings)
/// give a low confidence estimate. Check `residual` and `feature_count`.
pub fn estimate_from_flows(
    config: &Config,
    flows: &[SphereFlow],
    init_linear_velocity: Option<Vec3>,
    init_angular_velocity: Option<Vec3>,
) -> VelocityEstimate {
    let linear_velocity = match init_linear_velocity {
        None => Vec3::z(),
        Some(v) if s2::try_normalize(&v).is_some() => v,
        Some(v) => {
            warn!("Unusable initial linear velocity {:?}, using the optical axis", v);
            Vec3::z()
        }
    };
    let angular_velocity = init_angular_velocity
        .unwrap_or_else(|| initial_angular_velocity(flows, &linear_velocity));
    let initial_model = Motion {
        linear_velocity,
        angular_velocity,
    };

    let obs = Obs { flows, config };
    let (mut best, best_residual, best_iteration) =
        match NewtonState::iterative_solve(&obs, initial_model) {
            Ok((state, nb_iter)) => {
                debug!(
                    "Egomotion: residual {:e} at iteration {} / {} ({} flows)",
                    state.best_residual,
                    state.best_iteration,
                    nb_iter,
                    flows.len()
                );
                (state.best_model, state.best_residual, state.best_iteration)
            }
            Err(err) => {
                warn!("Egomotion optimization stopped: {}", err);
                (initial_model, residual(flows, &initial_model), 0)
            }
        };

    if vote_for_inversion(flows, &best) {
        best.linear_velocity = -best.linear_velocity;
    }

    VelocityEstimate {
        linear_velocity: best.linear_velocity,
        angular_velocity: best.angular_velocity,
        residual: best_residual,
        optimisation_steps: best_iteration,
        feature_count: flows.len(),
    }
}

/// Mean squared violation of the epipolar constraint on the sphere:
/// `ŵ · ((φ + ω × η) × η)` for each flow.
///
/// An empty set of flows has a zero residual.
#[allow(clippy::cast_precision_loss)]
pub fn residual(flows: &[SphereFlow], motion: &Motion) -> Float {
    let w_hat = s2::try_normalize(&motion.linear_velocity).unwrap_or_else(Vec3::zeros);
    let sum: Float = flows
        .iter()
        .map(|f| {
            let r = w_hat.dot(&constraint_vector(f, &motion.angular_velocity));
            r * r
        })
        .sum();
    sum / flows.len().max(1) as Float
}

/// Ordinary least squares estimation of the angular velocity,
/// for a known linear velocity.
///
/// If the linear velocity is negligible, flows are supposed purely rotational.
/// Otherwise, each flow is first stripped of its component
/// along the direction in which translation moves that bearing.
pub fn initial_angular_velocity(flows: &[SphereFlow], linear_velocity: &Vec3) -> Vec3 {
    if flows.is_empty() {
        return Vec3::zeros();
    }
    let use_translation = linear_velocity.norm() > LINEAR_VELOCITY_MIN_NORM;
    let mut a = Mat3::zeros();
    let mut b = Vec3::zeros();
    for f in flows {
        let eta = &f.bearing;
        a += s2::projector(eta);
        let eta_vel = s2::project(eta, linear_velocity);
        let phi = if use_translation && s2::try_normalize(&eta_vel).is_some() {
            s2::project(&eta_vel, &f.flow)
        } else {
            f.flow
        };
        b += so3::hat(*eta) * phi;
    }
    -pseudo_solve_3(a, &b)
}

/// Vote on the sign of the linear velocity.
///
/// Each flow implies a scaled inverse depth `-(P(η) v) · (φ + ω × η)`
/// which should be positive for points in front of the camera.
/// Returns true if the linear velocity should be negated.
pub fn vote_for_inversion(flows: &[SphereFlow], motion: &Motion) -> bool {
    let votes: i64 = flows
        .iter()
        .map(|f| {
            let eta_vel = s2::project(&f.bearing, &motion.linear_velocity);
            let scaled_inverse_depth =
                -eta_vel.dot(&(f.flow + motion.angular_velocity.cross(&f.bearing)));
            if scaled_inverse_depth < 0.0 {
                1
            } else if scaled_inverse_depth > 0.0 {
                -1
            } else {
                0
            }
        })
        .sum();
    votes > 0
}

// Optimizer ###################################################################

/// Observations of the Newton iterations.
struct Obs<'a> {
    flows: &'a [SphereFlow],
    config: &'a Config,
}

/// A model and its residual.
type EvalState = (Motion, Float);

/// State of the Newton optimizer.
/// Keeps the best model seen, which is not necessarily the last one.
struct NewtonState<'a> {
    flows: &'a [SphereFlow],
    convergence_threshold: Float,
    max_iterations: usize,
    model: Motion,
    residual: Float,
    best_model: Motion,
    best_residual: Float,
    best_iteration: usize,
}

impl<'a> OptimizerState<Obs<'a>, EvalState, Motion, &'static str> for NewtonState<'a> {
    fn init(obs: &Obs<'a>, model: Motion) -> Self {
        Self {
            flows: obs.flows,
            convergence_threshold: obs.config.convergence_threshold,
            max_iterations: obs.config.max_iterations,
            model,
            residual: residual(obs.flows, &model),
            best_model: model,
            best_residual: Float::INFINITY,
            best_iteration: 0,
        }
    }

    fn step(&self) -> Result<Motion, &'static str> {
        newton_step(self.flows, &self.model)
    }

    fn eval(&self, obs: &Obs<'a>, new_model: Motion) -> EvalState {
        (new_model, residual(obs.flows, &new_model))
    }

    /// Stop when the residual does not change anymore,
    /// or after too many iterations.
    fn stop_criterion(self, nb_iter: usize, eval_state: EvalState) -> (Self, Continue) {
        let (model, new_residual) = eval_state;
        trace!("Egomotion iteration {}: residual {:e}", nb_iter, new_residual);
        let mut kept_state = self;
        let d_residual = (kept_state.residual - new_residual).abs();
        if new_residual < kept_state.best_residual {
            kept_state.best_model = model;
            kept_state.best_residual = new_residual;
            kept_state.best_iteration = nb_iter;
        }
        kept_state.model = model;
        kept_state.residual = new_residual;
        let continuation = if d_residual <= kept_state.convergence_threshold
            || nb_iter >= kept_state.max_iterations
        {
            Continue::Stop
        } else {
            Continue::Forward
        };
        (kept_state, continuation)
    }
}

/// One Newton step in the tangent space of (ŵ on S2, ω in R3).
///
/// The Hessian is singular at least along ŵ, and can be much more degenerate
/// with few or coincident bearings, so the system is solved by SVD
/// which gives the minimum norm step.
fn newton_step(flows: &[SphereFlow], model: &Motion) -> Result<Motion, &'static str> {
    if flows.is_empty() {
        return Ok(*model);
    }
    let lin_norm = model.linear_velocity.norm();
    let w_hat = s2::try_normalize(&model.linear_velocity).unwrap_or_else(Vec3::z);
    let omega = &model.angular_velocity;

    let mut hess_11 = Mat3::zeros();
    let mut hess_12 = Mat3::zeros();
    let mut hess_22 = Mat3::zeros();
    let mut grad_2 = Vec3::zeros();
    for f in flows {
        let z_omega = constraint_vector(f, omega);
        let proj_eta = s2::projector(&f.bearing);
        let r = w_hat.dot(&z_omega);
        let proj_eta_w = proj_eta * w_hat;
        hess_11 += z_omega * z_omega.transpose();
        hess_12 += r * proj_eta + z_omega * proj_eta_w.transpose();
        hess_22 += proj_eta_w * proj_eta_w.transpose();
        grad_2 += r * proj_eta_w;
    }

    let proj_w = s2::projector(&w_hat);
    let hess_12 = -proj_w * hess_12;
    let mut hessian = Mat6::zeros();
    hessian
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&(proj_w * hess_11 * proj_w));
    hessian.fixed_view_mut::<3, 3>(0, 3).copy_from(&hess_12);
    hessian
        .fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&hess_12.transpose());
    hessian.fixed_view_mut::<3, 3>(3, 3).copy_from(&hess_22);

    let mut gradient = Vec6::zeros();
    gradient
        .fixed_rows_mut::<3>(0)
        .copy_from(&(proj_w * hess_11 * w_hat));
    gradient.fixed_rows_mut::<3>(3).copy_from(&(-grad_2));

    let svd = hessian.svd(true, true);
    let eps = SVD_RELATIVE_EPSILON * svd.singular_values.max();
    let step: Vec6 = svd.solve(&gradient, eps)?;
    let step_direction: Vec3 = step.fixed_rows::<3>(0).into_owned();
    let step_omega: Vec3 = step.fixed_rows::<3>(3).into_owned();

    let new_w_hat = s2::exp(&w_hat, &(-step_direction));
    Ok(Motion {
        linear_velocity: lin_norm * new_w_hat,
        angular_velocity: omega - step_omega,
    })
}

/// `(φ + ω × η) × η`, orthogonal to the linear velocity for noiseless flows.
fn constraint_vector(f: &SphereFlow, omega: &Vec3) -> Vec3 {
    (f.flow + omega.cross(&f.bearing)).cross(&f.bearing)
}

/// Minimum norm solution of a 3x3 linear system.
fn pseudo_solve_3(a: Mat3, b: &Vec3) -> Vec3 {
    let svd = a.svd(true, true);
    let eps = SVD_RELATIVE_EPSILON * svd.singular_values.max();
    svd.solve(b, eps).unwrap_or_else(|err| {
        warn!("Least squares solve failed: {}", err);
        Vec3::zeros()
    })
}

// TESTS #############################################################
