// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{
    ContextModel, ErrorPageKey, ErrorPageModel, EventListenerModel, FilterModel, ServletModel,
    WelcomeFileModel,
};

/// Any element a bundle can register.
#[derive(Debug, Clone)]
pub enum WebElement {
    Servlet(Arc<ServletModel>),
    Filter(Arc<FilterModel>),
    EventListener(Arc<EventListenerModel>),
    ErrorPage(Arc<ErrorPageModel>),
    WelcomeFiles(Arc<WelcomeFileModel>),
}

impl WebElement {
    pub fn id(&self) -> &str {
        match self {
            WebElement::Servlet(m) => m.id(),
            WebElement::Filter(m) => m.id(),
            WebElement::EventListener(m) => m.id(),
            WebElement::ErrorPage(m) => m.id(),
            WebElement::WelcomeFiles(m) => m.id(),
        }
    }

    pub fn context(&self) -> &Arc<ContextModel> {
        match self {
            WebElement::Servlet(m) => m.context(),
            WebElement::Filter(m) => m.context(),
            WebElement::EventListener(m) => m.context(),
            WebElement::ErrorPage(m) => m.context(),
            WebElement::WelcomeFiles(m) => m.context(),
        }
    }
}

/// Everything one bundle registered, in registration order.
///
/// The order is what gets replayed to a freshly started backend.
#[derive(Debug, Default)]
pub struct ServerModel {
    elements: IndexMap<String, WebElement>,
}

impl ServerModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, element: WebElement) {
        self.elements.insert(element.id().to_string(), element);
    }

    /// Remove an element, keeping the order of the others.
    pub fn remove(&mut self, id: &str) -> Option<WebElement> {
        self.elements.shift_remove(id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &WebElement> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn servlet_by_alias(&self, alias: &str) -> Option<&Arc<ServletModel>> {
        self.servlets().find(|m| m.alias() == Some(alias))
    }

    pub fn servlet_by_key(&self, key: usize) -> Option<&Arc<ServletModel>> {
        self.servlets().find(|m| m.servlet_key() == key)
    }

    pub fn servlets(&self) -> impl Iterator<Item = &Arc<ServletModel>> {
        self.elements.values().filter_map(|e| match e {
            WebElement::Servlet(m) => Some(m),
            _ => None,
        })
    }

    pub fn filter_by_key(&self, key: usize) -> Option<&Arc<FilterModel>> {
        self.elements.values().find_map(|e| match e {
            WebElement::Filter(m) if m.filter_key() == key => Some(m),
            _ => None,
        })
    }

    pub fn listener_by_key(&self, key: usize) -> Option<&Arc<EventListenerModel>> {
        self.elements.values().find_map(|e| match e {
            WebElement::EventListener(m) if m.listener_key() == key => Some(m),
            _ => None,
        })
    }

    pub fn error_page(&self, context_id: &str, error: &ErrorPageKey) -> Option<&Arc<ErrorPageModel>> {
        self.elements.values().find_map(|e| match e {
            WebElement::ErrorPage(m) if m.context().id() == context_id && m.error() == error => {
                Some(m)
            }
            _ => None,
        })
    }

    pub fn welcome_files(&self, context_id: &str) -> Option<&Arc<WelcomeFileModel>> {
        self.elements.values().find_map(|e| match e {
            WebElement::WelcomeFiles(m) if m.context().id() == context_id => Some(m),
            _ => None,
        })
    }

    /// Take every element out, most recent first.
    pub fn drain_reversed(&mut self) -> Vec<WebElement> {
        let mut drained: Vec<WebElement> = self.elements.drain(..).map(|(_, e)| e).collect();
        drained.reverse();
        drained
    }

    /// Take the elements of one context out, most recent first.
    pub fn drain_context_reversed(&mut self, context_id: &str) -> Vec<WebElement> {
        let ids: Vec<String> = self
            .elements
            .iter()
            .rev()
            .filter(|(_, e)| e.context().id() == context_id)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| self.elements.shift_remove(id)).collect()
    }
}
