// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Immutable descriptions of registered web elements.
//!
//! A model is created once per registration, shared as an `Arc` between the
//! owning bundle's journal, the registrations index and the backend, and
//! identified everywhere by its process-unique id. Backends key their
//! entries by that id, so the same model can be applied more than once
//! (replay after a restart) without duplicating anything.

#[cfg(test)]
mod tests;

mod context;
mod error_page;
mod filter;
mod listener;
mod server;
mod servlet;
mod welcome;

pub use context::ContextModel;
pub use error_page::{ErrorPageKey, ErrorPageModel};
pub use filter::FilterModel;
pub use listener::EventListenerModel;
pub use server::{ServerModel, WebElement};
pub use servlet::{MultipartConfig, ResourceModel, ServletModel};
pub use welcome::WelcomeFileModel;

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate an id such as `servlet-12`.
pub(crate) fn next_id(kind: &str) -> String {
    format!("{kind}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}
