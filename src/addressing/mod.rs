//! WS-Addressing: versions, message addressing properties, message-ID
//! strategies, the addressing interceptor and action-based mapping.

pub mod interceptor;
pub mod map;
pub mod mapping;
pub mod message_id;
pub mod version;

pub use interceptor::{
    AddressingInterceptor, AddressingState, MessageSender, MAP_PROPERTY, STATE_PROPERTY,
};
pub use map::{
    AddressingHeaders, AddressingViolation, EndpointReference, MessageAddressingProperties,
    ReplyProperties, ViolationKind,
};
pub use mapping::ActionMapping;
pub use message_id::{
    MessageIdStrategy, RandomGuidMessageIdStrategy, TrackingMessageIdStrategy,
    UuidMessageIdStrategy,
};
pub use version::AddressingVersion;
