pub mod activity;
pub mod aggregate;
pub mod eligibility;
pub mod model;
pub mod render;
pub mod time_serde;

pub use activity::{ActivityState, Thresholds, classify, hours_since, is_due};
pub use aggregate::{Aggregation, aggregate};
pub use eligibility::{
	Candidate, EligibilityOutcome, Excluded, Exclusion, OperatorPolicy, filter_candidates,
};
pub use model::{
	CharacterProfile, ChatEvent, ConversationKey, ConversationSummary, MessageType, Role,
	UserAccount,
};
pub use render::{ReEngagementMessage, mask_email, render_message};
