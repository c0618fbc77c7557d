pub mod element;
pub mod filter;
pub mod select;

pub use element::{score_i4_bytes, ElementType, INT4_MUL_TABLE, NIBBLE_TABLE};
pub use filter::{FilterNode, Literal, RelOp};
pub use select::{OrderByElem, SelectInfo, SelectedElement, SortOrder};
