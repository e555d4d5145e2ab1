use crate::ecs::physics::{BodyId, ContactPair, ShapeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

/// A contact between a subscribed body and a blade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionMatch {
    pub subscribed: BodyId,
    pub blade: BodyId,
}

pub type MatchCallback<Ctx> = Box<dyn FnOnce(&CollisionMatch, &mut Ctx) + Send + Sync>;

struct Subscription<Ctx> {
    handle: SubscriptionHandle,
    body: BodyId,
    on_match: MatchCallback<Ctx>,
}

/// One-shot blade contact subscriptions. A subscription leaves the watcher the
/// moment it fires, so later contacts on the same body are ignored.
pub struct CollisionWatcher<Ctx> {
    subscriptions: Vec<Subscription<Ctx>>,
    next_handle: u64,
}

impl<Ctx> Default for CollisionWatcher<Ctx> {
    fn default() -> Self {
        Self { subscriptions: Vec::new(), next_handle: 0 }
    }
}

impl<Ctx> CollisionWatcher<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, body: BodyId, on_match: MatchCallback<Ctx>) -> SubscriptionHandle {
        self.next_handle += 1;
        let handle = SubscriptionHandle(self.next_handle);
        self.subscriptions.push(Subscription { handle, body, on_match });
        handle
    }

    /// Returns `false` when the handle already fired or was removed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| sub.handle != handle);
        self.subscriptions.len() != before
    }

    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.iter().any(|sub| sub.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Fires every subscription whose body touched a blade in `events`.
    /// `shape_of` resolves the partner body's shape kind. Returns the number of callbacks run.
    pub fn dispatch<F>(&mut self, events: &[ContactPair], shape_of: F, ctx: &mut Ctx) -> usize
    where
        F: Fn(BodyId) -> Option<ShapeKind>,
    {
        let mut fired = 0;
        for event in events {
            let mut index = 0;
            while index < self.subscriptions.len() {
                let body = self.subscriptions[index].body;
                let blade = event
                    .partner_of(body)
                    .filter(|partner| *partner != body && shape_of(*partner) == Some(ShapeKind::Blade));
                match blade {
                    Some(blade) => {
                        let sub = self.subscriptions.remove(index);
                        (sub.on_match)(&CollisionMatch { subscribed: sub.body, blade }, ctx);
                        fired += 1;
                    }
                    None => index += 1,
                }
            }
        }
        fired
    }
}
