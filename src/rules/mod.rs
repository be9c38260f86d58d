//! Ordered rule engine.
//!
//! A [`RuleSet`] is an ordered list of `(predicate, code)` pairs. Applying
//! it to a block walks the list once, front to back; each rule overwrites
//! the state of every cell whose predicate holds against the state as left
//! by the rules before it. Later rules win, and there is no fixed-point
//! iteration.
//!
//! Predicates only ever read the state of the cell they are deciding, so
//! running the whole list cell by cell gives exactly the same result as
//! running each rule over the whole array in turn. The engine uses the
//! former to spread cells over the rayon pool.

pub mod taxonomy;

use std::collections::BTreeSet;
use std::ops::{Add, BitAnd, BitOr, Mul};

use rayon::prelude::*;

use crate::codes::Code;
use crate::error::{Result, StratError};
use crate::layers::{Layer, LayerStack};

/// Numeric expression over the layers of one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Layer(Layer),
    Const(f64),
    Add(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Boolean predicate over one cell's layers and current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Compare { lhs: Expr, op: CmpOp, rhs: Expr },
    /// Current state is one of the listed codes.
    StateIn(Vec<Code>),
    All(Vec<Cond>),
    Any(Vec<Cond>),
}

/// Stage of the key a rule belongs to. Groups run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleGroup {
    GrowthHabit,
    ForestSubtype,
    TussockOverride,
    ShrubHerbSubtype,
    Correction,
    Disturbance,
    Floodplain,
    LandCover,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Key number, e.g. `"1.12"`.
    pub id: &'static str,
    pub group: RuleGroup,
    pub when: Cond,
    pub code: Code,
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

/// Reads `layer` in a predicate.
pub fn v(layer: Layer) -> Expr {
    Expr::Layer(layer)
}

pub fn state_is(code: Code) -> Cond {
    Cond::StateIn(vec![code])
}

pub fn state_in(codes: &[Code]) -> Cond {
    Cond::StateIn(codes.to_vec())
}

impl From<Layer> for Expr {
    fn from(layer: Layer) -> Self {
        Expr::Layer(layer)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Const(f64::from(value))
    }
}

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        Expr::Add(Box::new(self), Box::new(rhs.into()))
    }
}

impl<T: Into<Expr>> Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        Expr::Mul(Box::new(self), Box::new(rhs.into()))
    }
}

impl Expr {
    fn compare(self, op: CmpOp, rhs: impl Into<Expr>) -> Cond {
        Cond::Compare {
            lhs: self,
            op,
            rhs: rhs.into(),
        }
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Cond {
        self.compare(CmpOp::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Cond {
        self.compare(CmpOp::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Cond {
        self.compare(CmpOp::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Cond {
        self.compare(CmpOp::Ge, rhs)
    }

    pub fn is(self, rhs: impl Into<Expr>) -> Cond {
        self.compare(CmpOp::Eq, rhs)
    }

    pub fn is_not(self, rhs: impl Into<Expr>) -> Cond {
        self.compare(CmpOp::Ne, rhs)
    }

    /// `lower <= self < upper`
    pub fn within(self, lower: impl Into<Expr>, upper: impl Into<Expr>) -> Cond {
        self.clone().ge(lower) & self.lt(upper)
    }

    fn eval(&self, slices: &[&[f64]], i: usize) -> f64 {
        match self {
            Expr::Layer(layer) => slices[layer.index()][i],
            Expr::Const(value) => *value,
            Expr::Add(a, b) => a.eval(slices, i) + b.eval(slices, i),
            Expr::Mul(a, b) => a.eval(slices, i) * b.eval(slices, i),
        }
    }

    fn collect_layers(&self, out: &mut BTreeSet<Layer>) {
        match self {
            Expr::Layer(layer) => {
                out.insert(*layer);
            }
            Expr::Const(_) => {}
            Expr::Add(a, b) | Expr::Mul(a, b) => {
                a.collect_layers(out);
                b.collect_layers(out);
            }
        }
    }
}

impl CmpOp {
    fn test(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

impl BitAnd for Cond {
    type Output = Cond;

    fn bitand(self, rhs: Cond) -> Cond {
        match self {
            Cond::All(mut conds) => {
                conds.push(rhs);
                Cond::All(conds)
            }
            lhs => Cond::All(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Cond {
    type Output = Cond;

    fn bitor(self, rhs: Cond) -> Cond {
        match self {
            Cond::Any(mut conds) => {
                conds.push(rhs);
                Cond::Any(conds)
            }
            lhs => Cond::Any(vec![lhs, rhs]),
        }
    }
}

impl Cond {
    fn eval(&self, slices: &[&[f64]], i: usize, state: Code) -> bool {
        match self {
            Cond::Compare { lhs, op, rhs } => op.test(lhs.eval(slices, i), rhs.eval(slices, i)),
            Cond::StateIn(codes) => codes.contains(&state),
            Cond::All(conds) => conds.iter().all(|c| c.eval(slices, i, state)),
            Cond::Any(conds) => conds.iter().any(|c| c.eval(slices, i, state)),
        }
    }

    fn collect_layers(&self, out: &mut BTreeSet<Layer>) {
        match self {
            Cond::Compare { lhs, rhs, .. } => {
                lhs.collect_layers(out);
                rhs.collect_layers(out);
            }
            Cond::StateIn(_) => {}
            Cond::All(conds) | Cond::Any(conds) => {
                conds.iter().for_each(|c| c.collect_layers(out));
            }
        }
    }
}

impl Rule {
    pub fn new(id: &'static str, group: RuleGroup, code: Code, when: Cond) -> Self {
        Self {
            id,
            group,
            when,
            code,
        }
    }

    pub fn layers(&self) -> BTreeSet<Layer> {
        let mut layers = BTreeSet::new();
        self.when.collect_layers(&mut layers);
        layers
    }
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every layer any predicate reads.
    pub fn required_layers(&self) -> BTreeSet<Layer> {
        let mut layers = BTreeSet::new();
        for rule in &self.rules {
            rule.when.collect_layers(&mut layers);
        }
        layers
    }

    /// Runs the full rule list over one block. `state` holds the initial
    /// classification and is updated in place.
    ///
    /// Fails before touching `state` if any layer read by a predicate is
    /// absent from `stack` or `state` does not cover the stack's cells.
    pub fn apply(&self, stack: &LayerStack, state: &mut [Code]) -> Result<()> {
        if state.len() != stack.len() {
            return Err(StratError::ShapeMismatch {
                layer: "classification state".to_string(),
                expected: stack.len(),
                actual: state.len(),
            });
        }
        stack.require(&self.required_layers())?;
        let slices = stack.slices();

        state.par_iter_mut().enumerate().for_each(|(i, cell)| {
            for rule in &self.rules {
                if rule.when.eval(&slices, i, *cell) {
                    *cell = rule.code;
                }
            }
        });
        Ok(())
    }

    /// Rules that fire for cell `index`, in order, starting from `initial`.
    /// The last entry's code is the cell's final classification.
    pub fn trace(&self, stack: &LayerStack, index: usize, initial: Code) -> Result<Vec<&Rule>> {
        if index >= stack.len() {
            return Err(StratError::ShapeMismatch {
                layer: "classification state".to_string(),
                expected: stack.len(),
                actual: index + 1,
            });
        }
        stack.require(&self.required_layers())?;
        let slices = stack.slices();

        let mut state = initial;
        let mut fired = Vec::new();
        for rule in &self.rules {
            if rule.when.eval(&slices, index, state) {
                state = rule.code;
                fired.push(rule);
            }
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(layers: &[(Layer, Vec<f64>)]) -> LayerStack {
        let len = layers.first().map_or(0, |(_, v)| v.len());
        let mut stack = LayerStack::new(len);
        for (layer, values) in layers {
            stack.insert(*layer, values.clone()).unwrap();
        }
        stack
    }

    #[test]
    fn later_rule_overrides_earlier() {
        let rules = RuleSet::new(vec![
            Rule::new("a", RuleGroup::GrowthHabit, 1, v(Layer::Alnus).ge(10)),
            Rule::new("b", RuleGroup::GrowthHabit, 2, v(Layer::Alnus).ge(20)),
        ]);
        let stack = stack(&[(Layer::Alnus, vec![5.0, 15.0, 25.0])]);
        let mut state = vec![0; 3];

        rules.apply(&stack, &mut state).unwrap();
        assert_eq!(state, vec![0, 1, 2]);
    }

    #[test]
    fn rules_see_state_written_before_them() {
        let rules = RuleSet::new(vec![
            Rule::new("a", RuleGroup::GrowthHabit, 1, v(Layer::Alnus).ge(10)),
            Rule::new(
                "b",
                RuleGroup::ForestSubtype,
                11,
                state_is(1) & v(Layer::Lichen).ge(5),
            ),
            // never sees 11 retroactively turn back into 1
            Rule::new("c", RuleGroup::ForestSubtype, 12, state_is(1)),
        ]);
        let stack = stack(&[
            (Layer::Alnus, vec![12.0, 12.0, 0.0]),
            (Layer::Lichen, vec![6.0, 0.0, 6.0]),
        ]);
        let mut state = vec![0; 3];

        rules.apply(&stack, &mut state).unwrap();
        assert_eq!(state, vec![11, 12, 0]);
    }

    #[test]
    fn arithmetic_expressions() {
        let cond = (v(Layer::Populbt) + 0.1).gt(v(Layer::Poptre));
        let rules = RuleSet::new(vec![Rule::new("p", RuleGroup::ForestSubtype, 20, cond)]);
        let stack = stack(&[
            (Layer::Populbt, vec![5.0, 5.0, 4.0]),
            (Layer::Poptre, vec![5.0, 5.1, 5.0]),
        ]);
        let mut state = vec![0; 3];

        rules.apply(&stack, &mut state).unwrap();
        // 5.1 > 5.1 is false in double precision as well
        assert_eq!(state, vec![20, 0, 0]);
    }

    #[test]
    fn any_and_within() {
        let cond = v(Layer::FireYear).within(2000, 2019)
            & (state_in(&[52, 53]) | v(Layer::EsaCover).is(20));
        let rules = RuleSet::new(vec![Rule::new("f", RuleGroup::Disturbance, 91, cond)]);
        let stack = stack(&[
            (Layer::FireYear, vec![2005.0, 2005.0, 2019.0, 2005.0]),
            (Layer::EsaCover, vec![0.0, 20.0, 20.0, 0.0]),
        ]);
        let mut state = vec![52, 0, 0, 4];

        rules.apply(&stack, &mut state).unwrap();
        assert_eq!(state, vec![91, 91, 0, 4]);
    }

    #[test]
    fn missing_layer_fails_before_writing() {
        let rules = RuleSet::new(vec![Rule::new(
            "a",
            RuleGroup::GrowthHabit,
            1,
            v(Layer::Alnus).ge(1) & v(Layer::Height).ge(1),
        )]);
        let stack = stack(&[(Layer::Alnus, vec![5.0])]);
        let mut state = vec![0];

        let err = rules.apply(&stack, &mut state).unwrap_err();
        assert!(matches!(err, StratError::MissingInput { ref layer } if layer == "height"));
        assert_eq!(state, vec![0]);
    }

    #[test]
    fn trace_lists_fired_rules() {
        let rules = RuleSet::new(vec![
            Rule::new("a", RuleGroup::GrowthHabit, 1, v(Layer::Alnus).ge(10)),
            Rule::new("b", RuleGroup::GrowthHabit, 2, v(Layer::Alnus).ge(50)),
            Rule::new("c", RuleGroup::ForestSubtype, 3, state_is(1)),
        ]);
        let stack = stack(&[(Layer::Alnus, vec![20.0])]);

        let fired: Vec<&str> = rules
            .trace(&stack, 0, 0)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(fired, vec!["a", "c"]);
    }

    #[test]
    fn state_length_must_match_stack() {
        let rules = RuleSet::new(vec![Rule::new("a", RuleGroup::GrowthHabit, 1, v(Layer::Alnus).ge(10))]);
        let stack = stack(&[(Layer::Alnus, vec![12.0])]);
        let mut state = vec![0, 0];

        let err = rules.apply(&stack, &mut state).unwrap_err();
        assert!(matches!(err, StratError::ShapeMismatch { expected: 1, actual: 2, .. }));
        assert_eq!(state, vec![0, 0]);
        assert!(rules.trace(&stack, 1, 0).is_err());
    }
}
