// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod user;

pub use credential::{Credential, CredentialView};
pub use user::{AuthTokens, User, UserProfile};
