//! SETUP packet decode
//!
//! Every control transfer starts with these eight bytes. The decoded
//! packet is stored by the control pipe and stays valid until the
//! next SETUP arrives.

use usb_device::control::{Recipient, RequestType};
use usb_device::UsbDirection;

#[derive(Debug, Clone, Copy)]
pub struct SetupPacket {
    /// Direction of the data stage, if any
    pub direction: UsbDirection,
    pub request_type: RequestType,
    pub recipient: Recipient,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub fn parse(bytes: &[u8; 8]) -> Self {
        let bm_request_type = bytes[0];
        SetupPacket {
            direction: if bm_request_type & 0x80 != 0 {
                UsbDirection::In
            } else {
                UsbDirection::Out
            },
            request_type: match (bm_request_type >> 5) & 0b11 {
                0 => RequestType::Standard,
                1 => RequestType::Class,
                2 => RequestType::Vendor,
                _ => RequestType::Reserved,
            },
            recipient: match bm_request_type & 0x1F {
                0 => Recipient::Device,
                1 => Recipient::Interface,
                2 => Recipient::Endpoint,
                3 => Recipient::Other,
                _ => Recipient::Reserved,
            },
            request: bytes[1],
            value: u16::from_le_bytes([bytes[2], bytes[3]]),
            index: u16::from_le_bytes([bytes[4], bytes[5]]),
            length: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }

    /// High byte of `wValue`: the descriptor type of a GET_DESCRIPTOR
    pub fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Low byte of `wValue`: the descriptor index of a GET_DESCRIPTOR
    pub fn descriptor_index(&self) -> u8 {
        self.value as u8
    }

    /// Endpoint address from `wIndex` of an endpoint-recipient request
    pub fn endpoint(&self) -> (usize, UsbDirection) {
        let index = (self.index & 0xF) as usize;
        let direction = if self.index & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        };
        (index, direction)
    }
}
