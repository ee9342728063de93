//! Control-plane data model module.
//!
//! # Purpose
//! Re-exports the request and response payloads for adaptors, subscriptions,
//! heartbeats and broker users, plus the rows persisted by the registry store.
mod adaptor;
mod heartbeat;
mod subscription;
mod user;

pub use adaptor::{AdaptorBindings, AdaptorRegistration, DeleteAdaptorRequest, RegisterAdaptorRequest};
pub use heartbeat::{HeartbeatRequest, HeartbeatRoute};
pub use subscription::{
    AppendStreamingRequest, CallbackNotification, CallbackRequest, CallbackSubscription,
    CallbackSummary, DeleteCallbackRequest, DeleteStreamingRequest, NotificationOp,
    StreamingBindings, StreamingRequest, StreamingSubscription,
};
pub use user::{BrokerUser, PasswordReset, UserCredentials};
