//! Topic registry: the static topic tree and the subscriptions derived from
//! a node's identity.

pub mod subscription;
pub mod tree;

pub use subscription::{FLEET_QOS, Subscription, SubscriptionSet};
pub use tree::TopicTree;
