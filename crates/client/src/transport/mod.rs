// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: request descriptors, auth endpoints, and the
//! authenticated pipeline.

pub mod api;
pub mod pipeline;
pub mod request;

pub use pipeline::AuthClient;
pub use request::{ApiRequest, Attempt};
