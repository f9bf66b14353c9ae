// Reference Table Build
// Ties the model, sampling, integration and branch assembly together into
// the immutable per-model travel-time tables

use log::info;

use crate::branch::{self, BoundarySlowness, BranchRef};
use crate::errors::ModelResult;
use crate::integrate::{self, IntegratedWave};
use crate::model::RadialModel;
use crate::sampler::{self, Sampling};

/// Immutable per-model reference tables, shared by every session on the
/// model. Built once, then only read.
#[derive(Debug)]
pub struct RefTables {
    pub model: RadialModel,
    pub sampling: Sampling,
    pub integrated: [IntegratedWave; 2],
    pub branches: Vec<BranchRef>,
    pub bounds: BoundarySlowness,
}

impl RefTables {
    pub fn build(model: RadialModel) -> ModelResult<Self> {
        let sampling = sampler::build_sampling(&model)?;
        let integrated = integrate::integrate_all(&model, &sampling)?;
        let branches = branch::build_branches(&model, &sampling, &integrated)?;
        let bounds = branch::boundary_slowness(&model);
        info!(
            "reference tables for {}: {} merged slownesses, {} branches",
            model.name(),
            sampling.merged.len(),
            branches.len()
        );
        Ok(Self {
            model,
            sampling,
            integrated,
            branches,
            bounds,
        })
    }

    pub fn find_branch(&self, code: &str) -> Option<&BranchRef> {
        branch::find_branch(&self.branches, code)
    }
}
