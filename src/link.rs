use std::cell::RefCell;
use std::rc::Rc;

use brickroom_core::ClientMsg;

/// Outgoing half of a room connection. Sends are fire-and-forget: a message
/// that cannot be delivered is dropped, never retried.
pub trait RoomLink {
    fn send(&self, msg: ClientMsg);
}

impl<L: RoomLink + ?Sized> RoomLink for &L {
    fn send(&self, msg: ClientMsg) {
        (**self).send(msg);
    }
}

impl<L: RoomLink + ?Sized> RoomLink for Rc<L> {
    fn send(&self, msg: ClientMsg) {
        (**self).send(msg);
    }
}

/// Link for editing without a relay.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineLink;

impl RoomLink for OfflineLink {
    fn send(&self, _msg: ClientMsg) {}
}

/// Keeps every sent message; shared clones see the same log.
#[derive(Clone, Debug, Default)]
pub struct MemoryLink {
    sent: Rc<RefCell<Vec<ClientMsg>>>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ClientMsg> {
        self.sent.borrow().clone()
    }

    pub fn take(&self) -> Vec<ClientMsg> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }
}

impl RoomLink for MemoryLink {
    fn send(&self, msg: ClientMsg) {
        self.sent.borrow_mut().push(msg);
    }
}
