pub mod context_matcher;
pub mod refiner;
pub mod search;

pub use context_matcher::{ContextMatch, ContextMatcher, ContextRule, RuleEntry};
pub use refiner::{EventRefiner, MalformedRecord, RefineStats, RefinedChat};
pub use search::{
    find_messages, find_user_messages, most_used_phrase, total_message_amount, UserQuery,
};
