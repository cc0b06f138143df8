//! Safety interception for crisis-flagged input

pub mod filter;

pub use filter::{
    Classification, SafetyConfig, SafetyFilter, DEFAULT_CRISIS_PHRASES, DEFAULT_HELPLINE_MESSAGE,
};
