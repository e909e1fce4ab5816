pub mod reports;
pub mod session;
pub mod tester;

pub use session::{SessionPlan, SessionStrategy, SessionSummary};
pub use tester::*;
