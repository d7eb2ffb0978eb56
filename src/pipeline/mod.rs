//! Email processing pipeline.
//!
//! Every inbound email flows through:
//! 1. `mime::extract_email_content()`: MIME tree to plain text
//! 2. `Classifier::classify()`: LLM classification and field extraction
//! 3. `Reconciler::reconcile()`: match against stored applications and mutate
//!
//! `TitleRanker` is consulted by the reconciler when an update has no exact
//! match and the role must be compared against older applications.

pub mod classifier;
pub mod email_processor;
pub mod reconcile;
pub mod similarity;
pub mod types;

pub use classifier::Classifier;
pub use email_processor::EmailProcessor;
pub use reconcile::Reconciler;
pub use similarity::TitleRanker;
pub use types::{
    ApplicationUpdate, ClassificationEvent, InboundEmail, ReconcileAction, ReconcileOutcome,
};
