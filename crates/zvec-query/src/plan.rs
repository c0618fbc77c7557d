//! Lowering a [`SelectInfo`] to a tree of kernel invocations
//! (SPEC_FULL.md §4.4 "Lowering to compute kernels", §6.3).
//!
//! This crate does not depend on `zvec-segment` — a `KernelExpr` names
//! the kernel to invoke (`check_not_filtered`, `fetch_vector`,
//! `fetch_sparse_vector`) by the same string `zvec-segment`'s
//! `KernelRegistry` keys its lookup table by, rather than holding a trait
//! object, so the planner stays decoupled from the kernel registry's
//! execution machinery.

use zvec_types::{FilterNode, Literal, RelOp, SelectInfo};

use crate::error::QueryError;

pub const CHECK_NOT_FILTERED: &str = "check_not_filtered";
pub const FETCH_VECTOR: &str = "fetch_vector";
pub const FETCH_SPARSE_VECTOR: &str = "fetch_sparse_vector";

/// One node of a lowered execution plan.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelExpr {
    /// A named kernel invocation over the `row_id` column, e.g.
    /// `check_not_filtered(row_id)` or `fetch_vector(row_id)`.
    Kernel { name: &'static str, column: String },
    /// A plain column reference that needs no kernel (scalar metadata).
    Column(String),
    Literal(Literal),
    Rel {
        op: RelOp,
        lhs: Box<KernelExpr>,
        rhs: Option<Box<KernelExpr>>,
    },
    And(Box<KernelExpr>, Box<KernelExpr>),
    Or(Box<KernelExpr>, Box<KernelExpr>),
    Call { name: String, args: Vec<KernelExpr> },
}

/// A fully lowered plan: the filter predicate (if any) and the kernel
/// expressions producing each requested vector column.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredPlan {
    pub table_name: String,
    pub predicate: Option<KernelExpr>,
    pub vector_fetches: Vec<KernelExpr>,
    pub limit: Option<i64>,
}

/// `row_id` is the well-known column every kernel in this workspace
/// keys its row-granular output to (§4.4, §6.3).
const ROW_ID_COLUMN: &str = "row_id";

/// `dense_vector_columns`/`sparse_vector_columns` tell the lowering pass
/// which selected element names name a vector column at all, and which
/// encoding each uses — information the planner itself has no way to
/// infer from the AST alone (it comes from the segment's schema, an
/// external collaborator per §1).
pub fn lower(
    info: &SelectInfo,
    dense_vector_columns: &[&str],
    sparse_vector_columns: &[&str],
) -> Result<LoweredPlan, QueryError> {
    let predicate = match &info.search_cond {
        Some(node) => Some(lower_filter(node)?),
        None => None,
    };

    let vector_fetches = info
        .selected_elems
        .iter()
        .filter(|e| !e.is_wildcard)
        .filter_map(|e| {
            if dense_vector_columns.contains(&e.name.as_str()) {
                Some(KernelExpr::Kernel {
                    name: FETCH_VECTOR,
                    column: e.name.clone(),
                })
            } else if sparse_vector_columns.contains(&e.name.as_str()) {
                Some(KernelExpr::Kernel {
                    name: FETCH_SPARSE_VECTOR,
                    column: e.name.clone(),
                })
            } else {
                None
            }
        })
        .collect();

    Ok(LoweredPlan {
        table_name: info.table_name.clone(),
        predicate,
        vector_fetches,
        limit: info.limit,
    })
}

/// Every leaf of the filter tree that references `row_id` is wrapped in
/// `check_not_filtered`, matching §4.4's "each `row_id`-referencing
/// expression" rule. Other identifiers lower to a plain column reference
/// — evaluating the rest of the predicate against stored columns is an
/// external collaborator's job (the execution engine), not this crate's.
fn lower_filter(node: &FilterNode) -> Result<KernelExpr, QueryError> {
    Ok(match node {
        FilterNode::And(l, r) => KernelExpr::And(Box::new(lower_filter(l)?), Box::new(lower_filter(r)?)),
        FilterNode::Or(l, r) => KernelExpr::Or(Box::new(lower_filter(l)?), Box::new(lower_filter(r)?)),
        FilterNode::Rel { op, lhs, rhs } => KernelExpr::Rel {
            op: *op,
            lhs: Box::new(lower_filter(lhs)?),
            rhs: match rhs {
                Some(rhs) => Some(Box::new(lower_filter(rhs)?)),
                None => None,
            },
        },
        FilterNode::Ident(name) if name == ROW_ID_COLUMN => KernelExpr::Kernel {
            name: CHECK_NOT_FILTERED,
            column: name.clone(),
        },
        FilterNode::Ident(name) => KernelExpr::Column(name.clone()),
        FilterNode::Const(lit) => KernelExpr::Literal(lit.clone()),
        FilterNode::Call { name, args } => KernelExpr::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(lower_filter)
                .collect::<Result<Vec<_>, _>>()?,
        },
        FilterNode::VectorPlaceholder => {
            return Err(QueryError::lower(
                "cannot lower a plan with an ungrafted vector placeholder",
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn row_id_predicate_wraps_check_not_filtered() {
        let info = Parser::parse("select * from docs where row_id = 5").unwrap();
        let plan = lower(&info, &[], &[]).unwrap();
        match plan.predicate {
            Some(KernelExpr::Rel { lhs, .. }) => {
                assert_eq!(
                    *lhs,
                    KernelExpr::Kernel {
                        name: CHECK_NOT_FILTERED,
                        column: "row_id".into()
                    }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn vector_column_lowers_to_fetch_vector() {
        let info = Parser::parse("select embedding from docs").unwrap();
        let plan = lower(&info, &["embedding"], &[]).unwrap();
        assert_eq!(
            plan.vector_fetches,
            vec![KernelExpr::Kernel {
                name: FETCH_VECTOR,
                column: "embedding".into()
            }]
        );
    }

    #[test]
    fn ungrafted_placeholder_fails_to_lower() {
        let mut info = Parser::parse("select * from docs where embedding = [1.0]").unwrap();
        info.search_cond.as_mut().unwrap().placeholderize();
        assert!(lower(&info, &["embedding"], &[]).is_err());
    }
}
