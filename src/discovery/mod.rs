//! Head discovery: the composable context, pluggable traits, and head model.

pub mod context;
pub mod heads;
pub mod traits;

pub use context::{DiscoveryContext, DiscoveryRequest, HeadFilter, HeadPrefilter};
pub use heads::{CheckoutStrategy, Head, HeadCategory, HeadOrigin};
pub use traits::{
    build_context, category_in_scope, BranchDiscoveryTrait, BranchFilterMode,
    ForkPullRequestDiscoveryTrait, OriginPullRequestDiscoveryTrait, SourceTrait, TagDiscoveryTrait,
};
