//! Filter AST (SPEC_FULL.md §3.4), represented as a tagged sum rather than
//! the original's RTTI-downcast node hierarchy (REDESIGN FLAGS, §9).

/// A scalar or vector/matrix literal carried by a [`FilterNode::Const`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    /// A single embedded query vector, e.g. `[1.0, 2.0, 3.0]`.
    Vector(Vec<f32>),
    /// A row-major embedded matrix, e.g. `[[1.0, 2.0], [3.0, 4.0]]`.
    Matrix(Vec<Vec<f32>>),
    /// The literal list on the right-hand side of `IN (...)`.
    InValueList(Vec<Literal>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
    ContainAll,
    ContainAny,
    NotContainAll,
    NotContainAny,
    IsNull,
    IsNotNull,
}

/// One node of the filter AST. Shared subtrees are never aliased: cloning a
/// tree (e.g. when grafting a cached plan, SPEC_FULL.md §4.4 "Plan cache")
/// deep-copies via the derived [`Clone`] impl.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    And(Box<FilterNode>, Box<FilterNode>),
    Or(Box<FilterNode>, Box<FilterNode>),
    Rel {
        op: RelOp,
        lhs: Box<FilterNode>,
        rhs: Option<Box<FilterNode>>,
    },
    Ident(String),
    Const(Literal),
    /// The substitution point a cached plan exposes for a re-parsed vector
    /// literal (SPEC_FULL.md §4.4 "rewrite queries").
    VectorPlaceholder,
    Call {
        name: String,
        args: Vec<FilterNode>,
    },
}

impl FilterNode {
    /// Walks the tree, replacing the first [`FilterNode::VectorPlaceholder`]
    /// found (depth-first, left-to-right) with `literal`. Returns whether a
    /// placeholder was found and replaced.
    pub fn graft_vector(&mut self, literal: Literal) -> bool {
        match self {
            FilterNode::VectorPlaceholder => {
                *self = FilterNode::Const(literal);
                true
            }
            FilterNode::And(l, r) | FilterNode::Or(l, r) => {
                l.graft_vector(literal.clone()) || r.graft_vector(literal)
            }
            FilterNode::Rel { lhs, rhs, .. } => {
                if lhs.graft_vector(literal.clone()) {
                    return true;
                }
                if let Some(rhs) = rhs {
                    rhs.graft_vector(literal)
                } else {
                    false
                }
            }
            FilterNode::Call { args, .. } => {
                for arg in args {
                    if arg.graft_vector(literal.clone()) {
                        return true;
                    }
                }
                false
            }
            FilterNode::Ident(_) | FilterNode::Const(_) => false,
        }
    }

    /// The dual of [`FilterNode::graft_vector`]: replaces the first vector
    /// or matrix literal (depth-first, left-to-right) with a
    /// [`FilterNode::VectorPlaceholder`], for caching a plan whose vector
    /// operand will be supplied fresh on every cache hit.
    pub fn placeholderize(&mut self) -> bool {
        match self {
            FilterNode::Const(Literal::Vector(_)) | FilterNode::Const(Literal::Matrix(_)) => {
                *self = FilterNode::VectorPlaceholder;
                true
            }
            FilterNode::And(l, r) | FilterNode::Or(l, r) => {
                l.placeholderize() || r.placeholderize()
            }
            FilterNode::Rel { lhs, rhs, .. } => {
                if lhs.placeholderize() {
                    return true;
                }
                match rhs {
                    Some(rhs) => rhs.placeholderize(),
                    None => false,
                }
            }
            FilterNode::Call { args, .. } => args.iter_mut().any(|a| a.placeholderize()),
            FilterNode::Ident(_) | FilterNode::Const(_) | FilterNode::VectorPlaceholder => false,
        }
    }
}
