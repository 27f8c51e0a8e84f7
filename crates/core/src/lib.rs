// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! parley-core: Shared library for the parley chat transport
//!
//! This crate provides the wire-level building blocks used by both the
//! `parley` client and the `parley-broker` development server: the STOMP
//! frame codec, topic naming, message normalization and display ordering.

pub mod error;
pub mod frame;
pub mod message;
pub mod rest;
pub mod timeline;
pub mod topic;

pub use error::{Error, Result};
pub use frame::{Command, Frame};
pub use message::{Attachment, DomainMessage, MessageId, OutgoingMessage};
pub use rest::UploadReceipt;
pub use timeline::Timeline;
