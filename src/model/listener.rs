// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use crate::core::{EventListener, identity};

use super::{ContextModel, next_id};

#[derive(Debug, Clone)]
pub struct EventListenerModel {
    id: String,
    context: Arc<ContextModel>,
    listener: Arc<dyn EventListener>,
}

impl EventListenerModel {
    pub fn new(context: Arc<ContextModel>, listener: Arc<dyn EventListener>) -> Self {
        Self {
            id: next_id("listener"),
            context,
            listener,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        &self.context
    }

    pub fn listener(&self) -> &Arc<dyn EventListener> {
        &self.listener
    }

    pub fn listener_key(&self) -> usize {
        identity(&self.listener)
    }
}
