pub mod detail;
pub mod explore;
pub mod reader;
pub mod ui;
pub mod widgets;
