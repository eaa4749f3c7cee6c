pub mod pager;
pub mod reader;
pub mod search;
pub mod theme;
