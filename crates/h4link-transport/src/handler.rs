use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use h4link_frame::{Packet, PacketType};

/// Receives packets completed by the transport.
///
/// `packet` is header + payload, without the type tag. The slice is only
/// valid for the duration of the call.
pub trait PacketHandler {
    fn handle_packet(&mut self, packet_type: PacketType, packet: &[u8]);
}

impl<F> PacketHandler for F
where
    F: FnMut(PacketType, &[u8]),
{
    fn handle_packet(&mut self, packet_type: PacketType, packet: &[u8]) {
        self(packet_type, packet)
    }
}

/// Handler that drops every packet. Installed until one is registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl PacketHandler for NoopHandler {
    fn handle_packet(&mut self, _packet_type: PacketType, _packet: &[u8]) {}
}

/// Handler that copies packets into a shared queue.
///
/// Clones share the same queue, so one clone can be registered with the
/// transport while another is drained by the consumer.
#[derive(Debug, Default, Clone)]
pub struct PacketQueue {
    packets: Rc<RefCell<VecDeque<Packet>>>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest queued packet.
    pub fn pop(&self) -> Option<Packet> {
        self.packets.borrow_mut().pop_front()
    }

    /// Take every queued packet.
    pub fn drain(&self) -> Vec<Packet> {
        self.packets.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.packets.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.borrow().is_empty()
    }
}

impl PacketHandler for PacketQueue {
    fn handle_packet(&mut self, packet_type: PacketType, packet: &[u8]) {
        self.packets
            .borrow_mut()
            .push_back(Packet::new(packet_type, packet.to_vec()));
    }
}
