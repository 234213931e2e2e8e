use crate::identity::{NodeIdentity, Role};
use crate::topics::TopicTree;

/// Delivery level requested for every fleet subscription.
pub const FLEET_QOS: u8 = 0;

/// One topic filter plus the QoS requested for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub qos: u8,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, qos: u8) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// Ordered subscriptions a node applies on every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriptionSet {
    entries: Vec<Subscription>,
}

impl SubscriptionSet {
    /// Computes the subscriptions for a resolved node.
    ///
    /// Everyone listens on the broadcast topic. Servers additionally watch
    /// every tester; a client only hears its own command topic.
    pub fn for_node(identity: &NodeIdentity, tree: &TopicTree) -> Self {
        let mut entries = vec![Subscription::new(tree.broadcast.clone(), FLEET_QOS)];

        match (&identity.role, identity.tester_id.as_deref()) {
            (Role::Server, _) => entries.push(Subscription::new(tree.tester_wildcard(), FLEET_QOS)),
            (Role::Client, Some(tester)) => {
                entries.push(Subscription::new(tree.tester_topic(tester), FLEET_QOS))
            }
            (Role::Client, None) => {}
        }

        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(topic, qos)` pairs in subscription order.
    pub fn pairs(&self) -> Vec<(&str, u8)> {
        self.entries.iter().map(|s| (s.topic.as_str(), s.qos)).collect()
    }
}

impl From<Vec<Subscription>> for SubscriptionSet {
    fn from(entries: Vec<Subscription>) -> Self {
        Self { entries }
    }
}
