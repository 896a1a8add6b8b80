//! egui rendering. Widgets edit page controls in place and ask the page to
//! refresh its view when something changed.

pub mod panels;
pub mod plot;
pub mod table;
