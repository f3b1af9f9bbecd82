//! A solver-agnostic representation of a linear or mixed-integer program.
//!
//! The formulation code builds a [`Program`] out of named variables and linear constraints. A
//! [`Solver`](crate::solver::Solver) implementation is then responsible for translating it into
//! whatever a concrete solver library expects.
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Tolerance used when checking whether a set of values satisfies the program's constraints
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// A decision variable in a [`Program`].
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Variable(usize);

impl Variable {
    /// The column index of the variable
    pub fn index(self) -> usize {
        self.0
    }
}

/// A reference to a constraint (row) in a [`Program`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ConstraintID(usize);

impl ConstraintID {
    /// The row index of the constraint
    pub fn index(self) -> usize {
        self.0
    }
}

/// The domain of a variable
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariableKind {
    /// Any real value between the bounds
    Continuous,
    /// Integer values between the bounds
    Integer,
    /// Zero or one
    Binary,
}

/// A variable's name, domain and objective coefficient
#[derive(Clone, PartialEq, Debug)]
pub struct VariableDefinition {
    /// Unique name, e.g. `BuildGen[solar,2020]`
    pub name: String,
    /// The variable's domain
    pub kind: VariableKind,
    /// Lower bound
    pub lower: f64,
    /// Upper bound (may be infinite)
    pub upper: f64,
    /// Coefficient in the objective function
    pub cost: f64,
}

/// A linear expression: a sum of weighted variables plus a constant
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LinearExpr {
    terms: Vec<(Variable, f64)>,
    constant: f64,
}

impl LinearExpr {
    /// An empty expression, equal to zero
    pub fn new() -> Self {
        Self::default()
    }

    /// An expression containing only a constant
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// An expression containing a single weighted variable
    pub fn term(var: Variable, coeff: f64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            constant: 0.0,
        }
    }

    /// Add `coeff × var` to this expression
    pub fn add_term(&mut self, var: Variable, coeff: f64) {
        self.terms.push((var, coeff));
    }

    /// Add `scale × other` to this expression
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        self.terms
            .extend(other.terms.iter().map(|(var, coeff)| (*var, coeff * scale)));
        self.constant += other.constant * scale;
    }

    /// Add a constant to this expression
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// A copy of this expression multiplied by `scale`
    pub fn scaled(&self, scale: f64) -> Self {
        let mut out = Self::new();
        out.add_scaled(self, scale);
        out
    }

    /// The constant part of the expression
    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    /// The variable terms of the expression, which may contain repeated variables
    pub fn terms(&self) -> &[(Variable, f64)] {
        &self.terms
    }

    /// Whether the expression has no variable terms
    pub fn has_no_terms(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merge repeated variables and drop terms with a zero coefficient.
    ///
    /// Terms are returned in order of first appearance.
    pub fn simplified(&self) -> Self {
        let mut index: HashMap<Variable, usize> = HashMap::new();
        let mut terms: Vec<(Variable, f64)> = Vec::with_capacity(self.terms.len());
        for &(var, coeff) in &self.terms {
            if let Some(&i) = index.get(&var) {
                terms[i].1 += coeff;
            } else {
                index.insert(var, terms.len());
                terms.push((var, coeff));
            }
        }
        terms.retain(|(_, coeff)| *coeff != 0.0);

        Self {
            terms,
            constant: self.constant,
        }
    }

    /// Evaluate the expression for the given variable values (indexed by column)
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum::<f64>()
            + self.constant
    }
}

impl From<Variable> for LinearExpr {
    fn from(var: Variable) -> Self {
        Self::term(var, 1.0)
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self.add_scaled(&rhs, 1.0);
        self
    }
}

impl AddAssign<&LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, 1.0);
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self.add_scaled(&rhs, -1.0);
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.scaled(rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self.scaled(-1.0)
    }
}

impl std::iter::Sum for LinearExpr {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(LinearExpr::new(), |acc, expr| acc + expr)
    }
}

impl FromIterator<(Variable, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (Variable, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

/// The relation between the two sides of a constraint
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConstraintSense {
    /// Left-hand side ≤ right-hand side
    LessEqual,
    /// Left-hand side ≥ right-hand side
    GreaterEqual,
    /// Left-hand side = right-hand side
    Equal,
}

impl fmt::Display for ConstraintSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
        };
        write!(f, "{symbol}")
    }
}

/// A linear constraint in normalised form: `terms (sense) rhs`
#[derive(Clone, PartialEq, Debug)]
pub struct Constraint {
    /// Unique name, e.g. `Zone_Energy_Balance[north,tp1]`
    pub name: String,
    /// Variable terms, with each variable appearing at most once
    pub terms: Vec<(Variable, f64)>,
    /// The relation between the terms and `rhs`
    pub sense: ConstraintSense,
    /// Right-hand side constant
    pub rhs: f64,
}

impl Constraint {
    /// Lower and upper bounds on the row activity
    pub fn bounds(&self) -> (f64, f64) {
        match self.sense {
            ConstraintSense::LessEqual => (f64::NEG_INFINITY, self.rhs),
            ConstraintSense::GreaterEqual => (self.rhs, f64::INFINITY),
            ConstraintSense::Equal => (self.rhs, self.rhs),
        }
    }

    /// The value of the row's left-hand side for the given variable values
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum()
    }

    /// The coefficient of a variable in this row (zero if it does not appear)
    pub fn coefficient(&self, var: Variable) -> f64 {
        self.terms
            .iter()
            .find(|(v, _)| *v == var)
            .map_or(0.0, |(_, coeff)| *coeff)
    }
}

/// A complete optimisation problem, to be minimised
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Program {
    variables: Vec<VariableDefinition>,
    constraints: Vec<Constraint>,
    objective_offset: f64,
}

impl Program {
    /// Add a variable to the program
    pub fn add_variable(
        &mut self,
        name: String,
        kind: VariableKind,
        lower: f64,
        upper: f64,
    ) -> Variable {
        debug_assert!(lower <= upper, "Invalid bounds for variable {name}");
        self.variables.push(VariableDefinition {
            name,
            kind,
            lower,
            upper,
            cost: 0.0,
        });

        Variable(self.variables.len() - 1)
    }

    /// Add a continuous variable with the given bounds
    pub fn add_continuous(&mut self, name: String, lower: f64, upper: f64) -> Variable {
        self.add_variable(name, VariableKind::Continuous, lower, upper)
    }

    /// Add a non-negative continuous variable with no upper bound
    pub fn add_non_negative(&mut self, name: String) -> Variable {
        self.add_continuous(name, 0.0, f64::INFINITY)
    }

    /// Add a binary variable
    pub fn add_binary(&mut self, name: String) -> Variable {
        self.add_variable(name, VariableKind::Binary, 0.0, 1.0)
    }

    /// Add an integer variable with the given bounds
    pub fn add_integer(&mut self, name: String, lower: f64, upper: f64) -> Variable {
        self.add_variable(name, VariableKind::Integer, lower, upper)
    }

    /// Add the constraint `lhs (sense) rhs`.
    ///
    /// Both sides may contain variables and constants; they are moved into normalised form.
    pub fn add_constraint(
        &mut self,
        name: String,
        lhs: LinearExpr,
        sense: ConstraintSense,
        rhs: LinearExpr,
    ) -> ConstraintID {
        let expr = (lhs - rhs).simplified();
        self.constraints.push(Constraint {
            name,
            terms: expr.terms,
            sense,
            rhs: -expr.constant,
        });

        ConstraintID(self.constraints.len() - 1)
    }

    /// Add `expr` to the objective function
    pub fn add_to_objective(&mut self, expr: &LinearExpr) {
        for &(var, coeff) in expr.terms() {
            self.variables[var.index()].cost += coeff;
        }
        self.objective_offset += expr.constant_value();
    }

    /// The program's variables, in column order
    pub fn variables(&self) -> &[VariableDefinition] {
        &self.variables
    }

    /// The program's constraints, in row order
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Get the definition of a variable
    pub fn variable(&self, var: Variable) -> &VariableDefinition {
        &self.variables[var.index()]
    }

    /// Get a constraint
    pub fn constraint(&self, id: ConstraintID) -> &Constraint {
        &self.constraints[id.index()]
    }

    /// Look up a variable by name (linear search, intended for diagnostics and tests)
    pub fn find_variable(&self, name: &str) -> Option<Variable> {
        self.variables
            .iter()
            .position(|def| def.name == name)
            .map(Variable)
    }

    /// Look up a constraint by name (linear search, intended for diagnostics and tests)
    pub fn find_constraint(&self, name: &str) -> Option<ConstraintID> {
        self.constraints
            .iter()
            .position(|row| row.name == name)
            .map(ConstraintID)
    }

    /// Constant term of the objective function
    pub fn objective_offset(&self) -> f64 {
        self.objective_offset
    }

    /// Whether any variable is integer or binary
    pub fn is_mip(&self) -> bool {
        self.variables
            .iter()
            .any(|def| def.kind != VariableKind::Continuous)
    }

    /// Objective function value for the given variable values
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(def, value)| def.cost * value)
            .sum::<f64>()
            + self.objective_offset
    }

    /// The name of the first variable bound or constraint violated by `values`, if any
    pub fn first_violation(&self, values: &[f64], tolerance: f64) -> Option<&str> {
        if values.len() != self.variables.len() {
            return Some("<wrong number of values>");
        }

        for (def, &value) in self.variables.iter().zip(values) {
            if value < def.lower - tolerance || value > def.upper + tolerance {
                return Some(&def.name);
            }
        }

        for row in &self.constraints {
            let (lower, upper) = row.bounds();
            let activity = row.activity(values);
            if activity < lower - tolerance || activity > upper + tolerance {
                return Some(&row.name);
            }
        }

        None
    }
}
