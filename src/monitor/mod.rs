//! Live monitoring state
//!
//! Results table shared between the scheduler (writer) and any UI layer
//! (reader), plus the rolling metric history shown alongside it.

pub mod history;
pub mod state;
pub mod table;


pub use history::{MetricChanges, MetricHistory, Trend};
pub use state::{InstrumentRow, MonitorState, Progress};
pub use table::{render_table, render_warning_details};
