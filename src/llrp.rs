pub mod bit_masks;
pub mod decoder;
pub mod encoder;
pub mod message_types;
pub mod parameter_types;

// Version bits placed in the message header. We only ever speak 1.0/1.1.
pub const VERSION_1_0: u16 = 1;
pub const VERSION_1_1: u16 = 2;

// Length of the fixed LLRP message header: 2 bytes version/type,
// 4 bytes total length, 4 bytes message id.
pub const HEADER_LEN: usize = 10;

// IANA private enterprise number used by ThingMagic custom
// messages and parameters.
pub const THINGMAGIC_VENDOR_ID: u32 = 26554;
