//! `SelectInfo`: a parsed `SELECT` statement (SPEC_FULL.md §3.5), owned by
//! the plan cache and cloned per execution.

use crate::filter::FilterNode;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedElement {
    pub name: String,
    pub alias: Option<String>,
    /// `true` for a bare `*`.
    pub is_wildcard: bool,
}

impl SelectedElement {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            is_wildcard: false,
        }
    }

    pub fn wildcard() -> Self {
        Self {
            name: "*".into(),
            alias: None,
            is_wildcard: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElem {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectInfo {
    pub table_name: String,
    pub selected_elems: Vec<SelectedElement>,
    pub search_cond: Option<FilterNode>,
    pub order_by: Vec<OrderByElem>,
    pub limit: Option<i64>,
    pub include_vector: bool,
    pub include_doc_id: bool,
    pub group_by: Option<Vec<String>>,
}

impl SelectInfo {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            selected_elems: Vec::new(),
            search_cond: None,
            order_by: Vec::new(),
            limit: None,
            include_vector: false,
            include_doc_id: false,
            group_by: None,
        }
    }
}
