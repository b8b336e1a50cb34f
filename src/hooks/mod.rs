//! Webhook ingestion: classification, normalization, and dispatch.
//!
//! The pipeline for one inbound request:
//!
//! 1. [`classifier::classify`] turns HTTP metadata into a
//!    ([`HookEventType`], [`HostingFlavor`]) pair.
//! 2. [`payload::normalize`] parses the flavor-specific JSON body into the
//!    provider-neutral [`HookEvent`] model.
//! 3. [`dispatch::dispatch`] hands the event to the registered processor,
//!    which triggers the host's asynchronous re-indexing.

pub mod classifier;
pub mod dispatch;
pub mod events;
pub mod payload;

pub use classifier::{classify, Classification, ClassifyError, HookEventType, HostingFlavor};
pub use dispatch::{
    dispatch, DispatchError, HookProcessor, ProcessContext, ProcessorRegistry, ReindexApi,
};
pub use events::{
    Actor, HookEvent, PrAction, PrRef, PullRequestEvent, PushEvent, RefChange, RefKind,
};
pub use payload::{normalize, PayloadError};
