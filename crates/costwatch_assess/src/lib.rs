//! # costwatch_assess
//!
//! The pure decision functions of the engine plus the optional AI advisor:
//! - **Cost estimation**: declared resources → deterministic monthly estimate
//! - **Risk assessment**: cost delta + context labels → risk level and recommendation
//! - **Advisor**: optional narrative augmentation that never changes a number
//!
//! Estimation and assessment are deterministic and infallible; only the
//! advisor performs I/O.

pub mod advisor;
pub mod error;
pub mod estimator;
pub mod risk;

pub use advisor::{narrate_change, Advisor, LlmAdvisor, LlmProvider, NoopAdvisor};
pub use error::{AssessError, AssessResult};
pub use estimator::{CostEstimator, UnitEstimate};
pub use risk::RiskAssessor;
