//! Capacity decisions: how much of each project is built, and when.
//!
//! Capacity is cumulative. A project's capacity in a period is the sum of everything built in or
//! before the first year of the period, and nothing is retired.
use super::{CostComponent, CostTerms};
use crate::model::Model;
use crate::model::parameters::VariantSelection;
use crate::program::{ConstraintSense, LinearExpr, Program, Variable};
use crate::project::{
    DEFAULT_MAX_STORAGE_DURATION, GenerationProject, ProjectID, VariantGroupID,
};
use indexmap::IndexMap;
use itertools::Itertools;

/// Variables for one project, keyed by build year
type BuildYearMap = IndexMap<u32, Variable>;

/// Handles to the capacity decision variables
pub struct BuildVariables {
    builds: IndexMap<ProjectID, BuildYearMap>,
    energy_builds: IndexMap<ProjectID, BuildYearMap>,
    variants: IndexMap<ProjectID, Variable>,
}

impl BuildVariables {
    /// Iterate over every build decision as `(project, build year, variable)`
    pub fn iter_builds(&self) -> impl Iterator<Item = (&ProjectID, u32, Variable)> {
        self.builds.iter().flat_map(|(id, years)| {
            years.iter().map(move |(year, var)| (id, *year, *var))
        })
    }

    /// The build variable for a project in a given year, if it can be built then
    pub fn build(&self, project: &ProjectID, year: u32) -> Option<Variable> {
        self.builds.get(project)?.get(&year).copied()
    }

    /// Cumulative power capacity of a project in `year`.
    ///
    /// # Panics
    ///
    /// If the project is unknown.
    pub fn capacity(&self, project: &ProjectID, year: u32) -> LinearExpr {
        cumulative(&self.builds[project], year)
    }

    /// Cumulative energy capacity of a storage project in `year`.
    ///
    /// Zero for projects which are not storage.
    pub fn energy_capacity(&self, project: &GenerationProject, year: u32) -> LinearExpr {
        let Some(storage) = project.storage() else {
            return LinearExpr::new();
        };

        match storage.energy_to_power_ratio {
            Some(ratio) => self.capacity(&project.id, year).scaled(ratio.value()),
            None => self
                .energy_builds
                .get(&project.id)
                .map(|years| cumulative(years, year))
                .unwrap_or_default(),
        }
    }

    /// The variant selection variable for a project, if it belongs to an active variant group
    pub fn variant(&self, project: &ProjectID) -> Option<Variable> {
        self.variants.get(project).copied()
    }
}

/// Sum of the variables with a build year no later than `year`
fn cumulative(years: &BuildYearMap, year: u32) -> LinearExpr {
    years
        .iter()
        .filter(|(build_year, _)| **build_year <= year)
        .map(|(_, var)| (*var, 1.0))
        .collect()
}

/// Add capacity decisions and their constraints and costs
pub fn add_build(program: &mut Program, costs: &mut CostTerms, model: &Model) -> BuildVariables {
    let period_starts = model.iter_periods().map(|period| period.start).collect_vec();

    let builds = model
        .projects
        .values()
        .map(|project| {
            let years = add_build_variables(program, project, &period_starts);
            (project.id.clone(), years)
        })
        .collect();
    let mut variables = BuildVariables {
        builds,
        energy_builds: IndexMap::new(),
        variants: IndexMap::new(),
    };

    add_capacity_limits(program, model, &variables);
    add_storage_energy_builds(program, model, &mut variables);
    add_hybrid_ratio_constraints(program, model, &variables);
    if model.parameters.select_variants != VariantSelection::None {
        add_variant_selection(program, model, &mut variables);
    }

    for period in model.iter_periods() {
        for project in model.projects.values() {
            let cost = project.ppa_capacity_cost.value();
            if cost != 0.0 {
                costs.add(
                    CostComponent::PpaCapacityCost,
                    period.id,
                    &variables.capacity(&project.id, period.start),
                    cost,
                );
            }
        }
    }

    variables
}

/// Add a build variable for every year in which a project can be built.
///
/// A project can be built at the start of any period and in any year with a predetermined build.
/// Predetermined builds before the first period are fixed.
fn add_build_variables(
    program: &mut Program,
    project: &GenerationProject,
    period_starts: &[u32],
) -> BuildYearMap {
    let limit = project.capacity_limit.value();
    let years = period_starts
        .iter()
        .chain(project.predetermined.keys())
        .copied()
        .sorted_unstable()
        .dedup();

    let mut map = BuildYearMap::new();
    for year in years {
        let name = format!("BuildGen[{},{year}]", project.id);
        let var = match project.predetermined.get(&year) {
            Some(capacity) if !period_starts.contains(&year) => {
                program.add_continuous(name, capacity.value(), capacity.value())
            }
            Some(capacity) => program.add_continuous(name, capacity.value(), limit),
            None => {
                let var = program.add_continuous(name, 0.0, limit);
                add_investment_options(program, project, year, var);
                var
            }
        };
        map.insert(year, var);
    }

    map
}

/// Minimum build size and discrete unit constraints on a new investment
fn add_investment_options(
    program: &mut Program,
    project: &GenerationProject,
    year: u32,
    build: Variable,
) {
    let id = &project.id;
    let limit = project.capacity_limit.value();

    if let Some(min_build) = project.min_build_capacity {
        // Either nothing is built or at least the minimum
        let is_built = program.add_binary(format!("BuildMinGenCap[{id},{year}]"));
        program.add_constraint(
            format!("Enforce_Min_Build_Lower[{id},{year}]"),
            LinearExpr::term(is_built, min_build.value()),
            ConstraintSense::LessEqual,
            build.into(),
        );
        program.add_constraint(
            format!("Enforce_Min_Build_Upper[{id},{year}]"),
            build.into(),
            ConstraintSense::LessEqual,
            LinearExpr::term(is_built, limit),
        );
    }

    if let Some(unit_size) = project.unit_size {
        let unit_size = unit_size.value();
        let units = program.add_integer(
            format!("BuildUnits[{id},{year}]"),
            0.0,
            (limit / unit_size).floor(),
        );
        program.add_constraint(
            format!("Build_Units_Consistency[{id},{year}]"),
            build.into(),
            ConstraintSense::Equal,
            LinearExpr::term(units, unit_size),
        );
    }
}

/// Cumulative capacity may not exceed the project's limit in any period
fn add_capacity_limits(program: &mut Program, model: &Model, variables: &BuildVariables) {
    for project in model.projects.values() {
        for period in model.iter_periods() {
            program.add_constraint(
                format!("Max_Build_Potential[{},{}]", project.id, period.id),
                variables.capacity(&project.id, period.start),
                ConstraintSense::LessEqual,
                LinearExpr::constant(project.capacity_limit.value()),
            );
        }
    }
}

/// Energy capacity decisions for storage without a fixed energy/power ratio
fn add_storage_energy_builds(program: &mut Program, model: &Model, variables: &mut BuildVariables) {
    for project in model.iter_storage() {
        if project
            .storage()
            .is_some_and(|storage| storage.energy_to_power_ratio.is_some())
        {
            continue;
        }

        let years: BuildYearMap = variables.builds[&project.id]
            .keys()
            .map(|year| {
                let name = format!("BuildStorageEnergy[{},{year}]", project.id);
                (*year, program.add_non_negative(name))
            })
            .collect();
        variables.energy_builds.insert(project.id.clone(), years);

        for period in model.iter_periods() {
            program.add_constraint(
                format!("Max_Storage_Duration[{},{}]", project.id, period.id),
                variables.energy_capacity(project, period.start),
                ConstraintSense::LessEqual,
                variables
                    .capacity(&project.id, period.start)
                    .scaled(DEFAULT_MAX_STORAGE_DURATION.value()),
            );
        }
    }
}

/// Keep the storage half of each hybrid within its capacity ratio of the generator half.
///
/// Applies to every build year the two halves have in common.
fn add_hybrid_ratio_constraints(program: &mut Program, model: &Model, variables: &BuildVariables) {
    for project in model.iter_storage() {
        let Some(hybrid) = project.storage().and_then(|storage| storage.hybrid.as_ref()) else {
            continue;
        };

        let generator_builds = &variables.builds[&hybrid.generator];
        for (year, storage_build) in &variables.builds[&project.id] {
            let Some(generator_build) = generator_builds.get(year) else {
                continue;
            };

            program.add_constraint(
                format!("Hybrid_Min_Ratio[{},{year}]", project.id),
                LinearExpr::term(*generator_build, hybrid.min_ratio.value()),
                ConstraintSense::LessEqual,
                (*storage_build).into(),
            );
            program.add_constraint(
                format!("Hybrid_Max_Ratio[{},{year}]", project.id),
                (*storage_build).into(),
                ConstraintSense::LessEqual,
                LinearExpr::term(*generator_build, hybrid.max_ratio.value()),
            );
        }
    }
}

/// At most one project from each variant group may be built
fn add_variant_selection(program: &mut Program, model: &Model, variables: &mut BuildVariables) {
    let mut groups: IndexMap<&VariantGroupID, Vec<&GenerationProject>> = IndexMap::new();
    for project in model.projects.values() {
        if let Some(group) = &project.variant_group {
            groups.entry(group).or_default().push(project);
        }
    }

    for (group, projects) in groups {
        let mut selected = LinearExpr::new();
        for project in projects {
            let name = format!("BuildVariant[{}]", project.id);
            let var = match model.parameters.select_variants {
                VariantSelection::Binary => program.add_binary(name),
                VariantSelection::Relaxed => program.add_continuous(name, 0.0, 1.0),
                VariantSelection::None => unreachable!(),
            };
            selected.add_term(var, 1.0);
            variables.variants.insert(project.id.clone(), var);

            for period in model.iter_periods() {
                program.add_constraint(
                    format!("Variant_Capacity_Limit[{},{}]", project.id, period.id),
                    variables.capacity(&project.id, period.start),
                    ConstraintSense::LessEqual,
                    LinearExpr::term(var, project.capacity_limit.value()),
                );
            }
        }

        program.add_constraint(
            format!("Select_Variant[{group}]"),
            selected,
            ConstraintSense::LessEqual,
            LinearExpr::constant(1.0),
        );
    }
}
