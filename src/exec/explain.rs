//! EXPLAIN / PROFILE: operator tree construction and rendering.
//!
//! The tree is derived from the statement's lightweight AST plus simple
//! cardinality heuristics. PROFILE additionally executes the statement
//! and annotates actual rows, a per-operator DB-hit estimate, and the
//! elapsed time.

use std::time::Instant;

use super::context::QueryContext;
use super::result::ExecutionResult;
use crate::cypher::ast::{Clause, Query};
use crate::cypher::pattern::PatternPart;
use crate::model::Value;
use crate::Result;

/// One node of the plan tree.
#[derive(Debug, Clone)]
pub struct PlanOperator {
    pub name: String,
    pub detail: String,
    pub estimated_rows: u64,
    pub children: Vec<PlanOperator>,
    pub actual_rows: Option<u64>,
    pub db_hits: Option<u64>,
    pub time_ms: Option<f64>,
}

impl PlanOperator {
    fn leaf(name: impl Into<String>, detail: impl Into<String>, estimated_rows: u64) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            estimated_rows,
            children: Vec::new(),
            actual_rows: None,
            db_hits: None,
            time_ms: None,
        }
    }

    fn wrap(self, name: impl Into<String>, detail: impl Into<String>, estimated_rows: u64) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            estimated_rows,
            children: vec![self],
            actual_rows: None,
            db_hits: None,
            time_ms: None,
        }
    }
}

/// Execute `EXPLAIN <query>` or `PROFILE <query>`.
///
/// `inner` is the statement with the mode prefix already stripped; the
/// closure runs it when profiling.
pub fn execute(
    ctx: &mut QueryContext,
    query: &Query,
    inner: &str,
    profile: bool,
) -> Result<ExecutionResult> {
    let mut plan = build_plan(ctx, query);

    let mut profiled: Option<ExecutionResult> = None;
    if profile {
        let started = Instant::now();
        let result = super::dispatch(ctx, inner)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        annotate_actuals(&mut plan, result.rows.len() as u64, elapsed_ms);
        profiled = Some(result);
    }

    let rendered = render(&plan);
    Ok(ExecutionResult {
        columns: vec!["Plan".into()],
        rows: vec![vec![Value::String(rendered.clone())]],
        stats: profiled.map(|r| r.stats).unwrap_or_default(),
        plan: Some(rendered),
    })
}

/// Derive the operator chain from the clause list, innermost first.
fn build_plan(ctx: &QueryContext, query: &Query) -> PlanOperator {
    let total_nodes = ctx.storage.node_count().unwrap_or(0).max(1);

    // Leaf: the first MATCH pattern decides the scan operator
    let mut scan: Option<PlanOperator> = None;
    let mut has_expand = false;
    for clause in &query.clauses {
        if let Clause::Match { patterns, .. } = clause {
            if let Some(pattern) = patterns.first() {
                if let Some(PatternPart::Node(node)) = pattern.parts.first() {
                    scan = Some(scan_operator(ctx, node, total_nodes));
                }
                has_expand = pattern.parts.len() > 1;
            }
            break;
        }
    }
    let mut estimated = scan.as_ref().map(|s| s.estimated_rows).unwrap_or(1);
    let mut plan = scan.unwrap_or_else(|| PlanOperator::leaf("Argument", "", 1));

    if has_expand {
        estimated *= 2;
        plan = plan.wrap("Expand(All)", "", estimated);
    }

    let mut aggregated = false;
    for clause in &query.clauses {
        match clause {
            Clause::Where(_) => {
                estimated = (estimated / 2).max(1);
                plan = plan.wrap("Filter", "", estimated);
            }
            Clause::Unwind { alias, .. } => {
                estimated *= 10;
                plan = plan.wrap("Unwind", alias.clone(), estimated);
            }
            Clause::Return { items, .. } | Clause::With { items } => {
                if !aggregated
                    && items
                        .iter()
                        .any(|i| super::projection::contains_aggregate(&i.text))
                {
                    aggregated = true;
                    estimated = 1;
                    plan = plan.wrap("EagerAggregation", "", estimated);
                }
            }
            Clause::OrderBy { .. } => {
                plan = plan.wrap("Sort", "", estimated);
            }
            Clause::Skip(n) => {
                estimated = estimated.saturating_sub(*n as u64).max(1);
                plan = plan.wrap("Skip", n.to_string(), estimated);
            }
            Clause::Limit(n) => {
                estimated = estimated.min(*n as u64).max(1);
                plan = plan.wrap("Limit", n.to_string(), estimated);
            }
            _ => {}
        }
    }

    plan = plan.wrap("Projection", "", estimated);
    plan.wrap("ProduceResults", "", estimated)
}

fn scan_operator(ctx: &QueryContext, node: &crate::cypher::pattern::NodePattern, total: u64) -> PlanOperator {
    match node.labels.first() {
        Some(label) => {
            let count = ctx
                .storage
                .nodes_by_label(label)
                .map(|nodes| nodes.len() as u64)
                .unwrap_or(total)
                .max(1);
            if node.properties.is_empty() {
                PlanOperator::leaf("NodeByLabelScan", format!(":{label}"), count)
            } else {
                let props: Vec<&str> =
                    node.properties.iter().map(|(k, _)| k.as_str()).collect();
                PlanOperator::leaf(
                    "NodeIndexSeek",
                    format!(":{label}({})", props.join(", ")),
                    (count / 2).max(1),
                )
            }
        }
        None => PlanOperator::leaf("AllNodesScan", "", total),
    }
}

/// Fill PROFILE columns: actual rows at the root, DB-hit estimates by
/// operator kind, elapsed time at the root.
fn annotate_actuals(plan: &mut PlanOperator, result_rows: u64, elapsed_ms: f64) {
    plan.time_ms = Some(elapsed_ms);
    fill(plan, result_rows);

    fn fill(op: &mut PlanOperator, rows: u64) {
        op.actual_rows = Some(rows);
        op.db_hits = Some(match op.name.as_str() {
            "AllNodesScan" | "NodeByLabelScan" => op.estimated_rows,
            "NodeIndexSeek" => op.estimated_rows.max(1),
            "Expand(All)" => op.estimated_rows * 2,
            "Filter" | "Projection" => op.estimated_rows,
            _ => 0,
        });
        for child in &mut op.children {
            fill(child, rows.max(child.estimated_rows.min(rows)));
        }
    }
}

/// Render the tree as the indented single-column table Neo4j users
/// expect.
fn render(plan: &PlanOperator) -> String {
    let mut out = String::new();
    render_into(plan, 0, &mut out);
    out
}

fn render_into(op: &PlanOperator, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('+');
    out.push_str(&op.name);
    if !op.detail.is_empty() {
        out.push_str(&format!("({})", op.detail));
    }
    out.push_str(&format!(" {{estimated rows: {}", op.estimated_rows));
    if let Some(actual) = op.actual_rows {
        out.push_str(&format!(", rows: {actual}"));
    }
    if let Some(hits) = op.db_hits {
        out.push_str(&format!(", db hits: {hits}"));
    }
    if let Some(ms) = op.time_ms {
        out.push_str(&format!(", time: {ms:.1} ms"));
    }
    out.push_str("}\n");
    for child in &op.children {
        render_into(child, depth + 1, out);
    }
}
