//! 规划层：子目标分解、结果审查与重试决策、最终合成

pub mod planner;
pub mod reviewer;
pub mod synthesizer;

pub use planner::{PlanOutcome, TaskPlanner};
pub use reviewer::{decide, TaskReviewer, Verdict};
pub use synthesizer::Synthesizer;
