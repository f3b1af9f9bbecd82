//! Generator dispatch, excess generation and curtailment.
//!
//! Output from a variable project in each timepoint is split three ways: energy used to serve load
//! or charge storage (dispatch), energy that is generated but not needed (excess), and energy that
//! is withheld (curtailment). All three are paid for under the contract, but only dispatch and
//! excess count as generation.
use super::build::BuildVariables;
use super::{CostComponent, CostTerms};
use crate::model::Model;
use crate::program::{ConstraintSense, LinearExpr, Program, Variable};
use crate::project::{ProjectID, ProjectKind};
use crate::timescale::TimepointID;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Handles to the dispatch variables of non-storage projects
pub struct DispatchVariables {
    dispatch: IndexMap<(ProjectID, TimepointID), Variable>,
    excess: HashMap<(ProjectID, TimepointID), Variable>,
    curtailment: HashMap<(ProjectID, TimepointID), Variable>,
}

impl DispatchVariables {
    /// Get the dispatch variable for a project in a timepoint.
    ///
    /// # Panics
    ///
    /// If the project is storage or unknown.
    pub fn dispatch(&self, project: &ProjectID, timepoint: &TimepointID) -> Variable {
        *self
            .dispatch
            .get(&(project.clone(), timepoint.clone()))
            .expect("No dispatch variable found for given project and timepoint")
    }

    /// The excess generation variable, for variable projects only
    pub fn excess(&self, project: &ProjectID, timepoint: &TimepointID) -> Option<Variable> {
        self.excess
            .get(&(project.clone(), timepoint.clone()))
            .copied()
    }

    /// The curtailment variable, for variable projects only
    pub fn curtailment(&self, project: &ProjectID, timepoint: &TimepointID) -> Option<Variable> {
        self.curtailment
            .get(&(project.clone(), timepoint.clone()))
            .copied()
    }

    /// Generation counted towards the target: dispatch plus excess
    pub fn total_generation(&self, project: &ProjectID, timepoint: &TimepointID) -> LinearExpr {
        let mut expr = LinearExpr::from(self.dispatch(project, timepoint));
        if let Some(excess) = self.excess(project, timepoint) {
            expr.add_term(excess, 1.0);
        }
        expr
    }

    /// Iterate over dispatch variables as `(project, timepoint, variable)`
    pub fn iter_dispatch(&self) -> impl Iterator<Item = (&ProjectID, &TimepointID, Variable)> {
        self.dispatch
            .iter()
            .map(|((project, timepoint), var)| (project, timepoint, *var))
    }
}

/// Add dispatch variables and limits for every non-storage project
pub fn add_dispatch(
    program: &mut Program,
    costs: &mut CostTerms,
    model: &Model,
    build: &BuildVariables,
) -> DispatchVariables {
    let mut variables = DispatchVariables {
        dispatch: IndexMap::new(),
        excess: HashMap::new(),
        curtailment: HashMap::new(),
    };
    let threshold = model.parameters.curtailment_price_threshold.value();

    for project in model.iter_generators() {
        let id = &project.id;
        for period in model.iter_periods() {
            let availability = project.availability(period.start);
            let capacity = build.capacity(id, period.start);

            for tp in model.iter_timepoints(period.id) {
                let t = &tp.id;
                let dispatch = program.add_non_negative(format!("DispatchGen[{id},{t}]"));
                let key = (id.clone(), t.clone());
                variables.dispatch.insert(key.clone(), dispatch);

                let available = capacity.scaled(project.capacity_factor(t) * availability);
                let mut contracted = LinearExpr::from(dispatch);
                match project.kind {
                    ProjectKind::Variable => {
                        let excess = program.add_non_negative(format!("ExcessGen[{id},{t}]"));

                        // Curtailment is only an option when the price is low enough
                        let max_curtailment = if model.nodal_price(project, t) <= threshold {
                            f64::INFINITY
                        } else {
                            0.0
                        };
                        let curtailment = program.add_continuous(
                            format!("CurtailGen[{id},{t}]"),
                            0.0,
                            max_curtailment,
                        );

                        contracted.add_term(excess, 1.0);
                        contracted.add_term(curtailment, 1.0);
                        program.add_constraint(
                            format!("Variable_Generation[{id},{t}]"),
                            contracted.clone(),
                            ConstraintSense::Equal,
                            available,
                        );
                        variables.excess.insert(key.clone(), excess);
                        variables.curtailment.insert(key, curtailment);
                    }
                    ProjectKind::Baseload => {
                        program.add_constraint(
                            format!("Baseload_Generation[{id},{t}]"),
                            dispatch.into(),
                            ConstraintSense::Equal,
                            available,
                        );
                    }
                    ProjectKind::Dispatchable => {
                        program.add_constraint(
                            format!("Dispatchable_Generation[{id},{t}]"),
                            dispatch.into(),
                            ConstraintSense::LessEqual,
                            available,
                        );
                    }
                    ProjectKind::Storage(_) => unreachable!(),
                }

                costs.add(
                    CostComponent::PpaEnergyCost,
                    period.id,
                    &contracted,
                    project.ppa_energy_cost.value() * tp.weight_in_year,
                );
            }
        }
    }

    variables
}
