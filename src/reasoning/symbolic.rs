//! Symbolic contrarian reasoner.
//!
//! Evaluates a small rule program of contrarian predicates over a
//! market's option-A ratio. Rules are written as s-expressions:
//!
//! ```text
//! (contrarian BUY_B (> RATIO 0.7))
//! (contrarian BUY_A (> (- 1 RATIO) 0.7))
//! ```
//!
//! The program is parsed and dry-run once in `SymbolicEngine::probe`.
//! If that fails the layer is unavailable and the caller falls back to
//! the heuristic engine. Lines starting with `;` are comments.

use tracing::debug;

use super::{ContrarianReasoner, ReasoningConfig};
use crate::types::{
    Action, AnalysisPath, AnalysisResult, EngineError, MarketSnapshot, SignalTier,
};

/// Built-in contrarian rules.
pub const DEFAULT_RULES: &str = "
; heavily favored A -> take B
(contrarian BUY_B (> RATIO 0.7))
; heavily favored B -> take A
(contrarian BUY_A (> (- 1 RATIO) 0.7))
";

// ---------------------------------------------------------------------------
// Rule language
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Op {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Op::Add),
            "-" => Some(Op::Sub),
            "*" => Some(Op::Mul),
            "/" => Some(Op::Div),
            ">" => Some(Op::Gt),
            "<" => Some(Op::Lt),
            ">=" => Some(Op::Ge),
            "<=" => Some(Op::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Ratio,
    Apply(Op, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
}

impl Expr {
    fn eval(&self, ratio: f64) -> Result<Value, EngineError> {
        match self {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Ratio => Ok(Value::Num(ratio)),
            Expr::Apply(op, lhs, rhs) => {
                let (l, r) = match (lhs.eval(ratio)?, rhs.eval(ratio)?) {
                    (Value::Num(l), Value::Num(r)) => (l, r),
                    _ => {
                        return Err(EngineError::ReasonerUnavailable(format!(
                            "operator {op:?} expects numeric operands"
                        )))
                    }
                };
                let value = match op {
                    Op::Add => Value::Num(l + r),
                    Op::Sub => Value::Num(l - r),
                    Op::Mul => Value::Num(l * r),
                    Op::Div => Value::Num(l / r),
                    Op::Gt => Value::Bool(l > r),
                    Op::Lt => Value::Bool(l < r),
                    Op::Ge => Value::Bool(l >= r),
                    Op::Le => Value::Bool(l <= r),
                };
                match value {
                    Value::Num(n) if !n.is_finite() => Err(EngineError::ReasonerUnavailable(
                        format!("operator {op:?} produced a non-finite value"),
                    )),
                    v => Ok(v),
                }
            }
        }
    }
}

/// One contrarian predicate: when `condition` holds, recommend `action`.
#[derive(Debug, Clone, PartialEq)]
struct Rule {
    action: Action,
    condition: Expr,
}

impl Rule {
    fn holds(&self, ratio: f64) -> Result<bool, EngineError> {
        match self.condition.eval(ratio)? {
            Value::Bool(b) => Ok(b),
            Value::Num(_) => Err(EngineError::ReasonerUnavailable(format!(
                "rule for {} does not evaluate to a boolean",
                self.action
            ))),
        }
    }
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for line in source.lines() {
        let line = line.split(';').next().unwrap_or_default();
        for word in line.replace('(', " ( ").replace(')', " ) ").split_whitespace() {
            tokens.push(word.to_string());
        }
    }
    tokens
}

struct Parser {
    tokens: Vec<String>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Result<String, EngineError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or_else(|| {
            EngineError::ReasonerUnavailable("unexpected end of rule program".into())
        })?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: &str) -> Result<(), EngineError> {
        let got = self.next()?;
        if got == want {
            Ok(())
        } else {
            Err(EngineError::ReasonerUnavailable(format!(
                "expected '{want}', found '{got}'"
            )))
        }
    }

    fn rules(&mut self) -> Result<Vec<Rule>, EngineError> {
        let mut rules = Vec::new();
        while self.pos < self.tokens.len() {
            rules.push(self.rule()?);
        }
        Ok(rules)
    }

    fn rule(&mut self) -> Result<Rule, EngineError> {
        self.expect("(")?;
        self.expect("contrarian")?;
        let tag = self.next()?;
        let action = Action::from_tag(&tag)
            .filter(|a| a.is_directional())
            .ok_or_else(|| {
                EngineError::ReasonerUnavailable(format!("unknown contrarian action '{tag}'"))
            })?;
        let condition = self.expr()?;
        self.expect(")")?;
        Ok(Rule { action, condition })
    }

    fn expr(&mut self) -> Result<Expr, EngineError> {
        let tok = self.next()?;
        match tok.as_str() {
            "(" => {
                let op_tok = self.next()?;
                let op = Op::parse(&op_tok).ok_or_else(|| {
                    EngineError::ReasonerUnavailable(format!("unknown operator '{op_tok}'"))
                })?;
                let lhs = self.expr()?;
                let rhs = self.expr()?;
                self.expect(")")?;
                Ok(Expr::Apply(op, Box::new(lhs), Box::new(rhs)))
            }
            "RATIO" => Ok(Expr::Ratio),
            other => other.parse::<f64>().map(Expr::Num).map_err(|_| {
                EngineError::ReasonerUnavailable(format!("unexpected token '{other}'"))
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SymbolicEngine {
    rules: Vec<Rule>,
    config: ReasoningConfig,
}

impl SymbolicEngine {
    /// Load and dry-run a rule program. Any failure means the symbolic
    /// layer is unavailable.
    pub fn probe(program: &str, config: ReasoningConfig) -> Result<Self, EngineError> {
        let mut parser = Parser {
            tokens: tokenize(program),
            pos: 0,
        };
        let rules = parser.rules()?;
        if rules.is_empty() {
            return Err(EngineError::ReasonerUnavailable(
                "rule program contains no rules".into(),
            ));
        }
        for rule in &rules {
            rule.holds(0.5)?;
        }
        Ok(Self { rules, config })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The first contrarian predicate that holds for `ratio`, with its
    /// confidence. `Ok(None)` when no predicate holds.
    pub fn infer(&self, option_a_ratio: f64) -> Result<Option<(Action, f64)>, EngineError> {
        for rule in &self.rules {
            if rule.holds(option_a_ratio)? {
                let favored = match rule.action {
                    Action::BuyB => option_a_ratio,
                    _ => 1.0 - option_a_ratio,
                };
                let confidence = ((favored - 0.5) * 2.0)
                    .max(self.config.symbolic_confidence_floor)
                    .min(self.config.symbolic_confidence_cap);
                return Ok(Some((rule.action, confidence)));
            }
        }
        Ok(None)
    }
}

impl ContrarianReasoner for SymbolicEngine {
    fn evaluate(&self, market: &MarketSnapshot) -> Result<AnalysisResult, EngineError> {
        let a = market.option_a_ratio();

        let (action, confidence, tier, reasoning) = match self.infer(a)? {
            Some((action, confidence)) => {
                let (favored, favored_ratio, other) = match action {
                    Action::BuyB => (&market.option_a, a, &market.option_b),
                    _ => (&market.option_b, 1.0 - a, &market.option_a),
                };
                (
                    action,
                    confidence,
                    SignalTier::Strong {
                        underdog_ratio: 1.0 - favored_ratio,
                    },
                    format!(
                        "Contrarian rule fired: '{favored}' favored at {:.1}%. \
                         Crowd bias detected, '{other}' offers value.",
                        favored_ratio * 100.0
                    ),
                )
            }
            None => (
                Action::Hold,
                self.config.baseline_confidence,
                SignalTier::Neutral,
                format!(
                    "No contrarian rule fired: '{}' {:.1}% vs '{}' {:.1}%. \
                     Waiting for a stronger crowd bias.",
                    market.option_a,
                    a * 100.0,
                    market.option_b,
                    (1.0 - a) * 100.0
                ),
            ),
        };

        debug!(
            market_id = %market.id,
            ratio = format!("{:.3}", a),
            action = %action,
            confidence = format!("{:.2}", confidence),
            "Symbolic analysis"
        );

        Ok(AnalysisResult {
            action,
            confidence,
            tier,
            reasoning,
            risk: self.config.seed_risk(market.total_pool),
            path: AnalysisPath::Symbolic,
        })
    }

    fn name(&self) -> &'static str {
        "symbolic"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
