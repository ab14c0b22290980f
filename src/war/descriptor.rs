// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `web.xml` parsing.
//!
//! Elements are matched by local name, so descriptors of every Servlet-API
//! version (and descriptors without a namespace) are read the same way.

use std::str::FromStr;

use log::{debug, warn};
use roxmltree::{Document, Node};

use crate::core::{DispatcherType, InitParams};
use crate::model::MultipartConfig;

use super::{
    DescriptorError, WebAppErrorPage, WebAppFilter, WebAppFilterMapping, WebAppModel,
    WebAppServlet, WebAppServletMapping,
};

/// Reads a deployment descriptor into a [`WebAppModel`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorParser;

impl DescriptorParser {
    pub fn parse(xml: &str) -> Result<WebAppModel, DescriptorError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if root.tag_name().name() != "web-app" {
            return Err(DescriptorError::NotAWebApp(root.tag_name().name().to_string()));
        }

        let mut web_app = WebAppModel::new();
        web_app.metadata_complete = root
            .attribute("metadata-complete")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"));

        for node in elements(root) {
            match node.tag_name().name() {
                "display-name" => web_app.display_name = text(node),
                "context-param" => {
                    let (name, value) = param(node)?;
                    web_app.context_params.insert(name, value);
                }
                "session-config" => {
                    if let Some(timeout) = child_text(node, "session-timeout") {
                        let minutes = timeout
                            .parse::<u32>()
                            .map_err(|_| DescriptorError::invalid("session-timeout", &timeout))?;
                        web_app.session_timeout = Some(minutes);
                    }
                }
                "servlet" => {
                    let servlet = parse_servlet(node)?;
                    let name = servlet.name.clone();
                    if !web_app.add_servlet(servlet) {
                        return Err(DescriptorError::Duplicate {
                            element: "servlet".to_string(),
                            name,
                        });
                    }
                }
                "servlet-mapping" => {
                    let servlet_name = required(node, "servlet-name")?;
                    let url_patterns = children_text(node, "url-pattern");
                    web_app.add_servlet_mapping(WebAppServletMapping {
                        servlet_name,
                        url_patterns,
                    });
                }
                "filter" => {
                    let filter = parse_filter(node)?;
                    let name = filter.name.clone();
                    if !web_app.add_filter(filter) {
                        return Err(DescriptorError::Duplicate {
                            element: "filter".to_string(),
                            name,
                        });
                    }
                }
                "filter-mapping" => web_app.add_filter_mapping(parse_filter_mapping(node)?),
                "listener" => web_app.listeners.push(required(node, "listener-class")?),
                "error-page" => {
                    let location = required(node, "location")?;
                    let error = child_text(node, "error-code")
                        .or_else(|| child_text(node, "exception-type"));
                    match error {
                        Some(error) => web_app.error_pages.push(WebAppErrorPage { error, location }),
                        None => warn!("Ignoring default error page {}; an error code or exception type is required", location),
                    }
                }
                "welcome-file-list" => {
                    web_app
                        .welcome_files
                        .extend(children_text(node, "welcome-file"));
                }
                "mime-mapping" => {
                    let extension = required(node, "extension")?;
                    let mime_type = required(node, "mime-type")?;
                    web_app.mime_mappings.insert(extension, mime_type);
                }
                other => debug!("Skipping unsupported web.xml element <{}>", other),
            }
        }
        Ok(web_app)
    }
}

fn parse_servlet(node: Node<'_, '_>) -> Result<WebAppServlet, DescriptorError> {
    let load_on_startup = match child(node, "load-on-startup") {
        // an empty element means "load at any time", as early as possible
        Some(element) => match text(element) {
            Some(value) => Some(
                value
                    .parse::<i32>()
                    .map_err(|_| DescriptorError::invalid("load-on-startup", &value))?,
            ),
            None => Some(0),
        },
        None => None,
    };
    let multipart = child(node, "multipart-config")
        .map(parse_multipart)
        .transpose()?;

    Ok(WebAppServlet {
        name: required(node, "servlet-name")?,
        class: child_text(node, "servlet-class"),
        init_params: init_params(node)?,
        load_on_startup,
        async_supported: flag(node, "async-supported")?,
        multipart,
    })
}

fn parse_multipart(node: Node<'_, '_>) -> Result<MultipartConfig, DescriptorError> {
    let mut config = MultipartConfig {
        location: child_text(node, "location"),
        ..MultipartConfig::default()
    };
    if let Some(size) = number(node, "max-file-size")? {
        config.max_file_size = size;
    }
    if let Some(size) = number(node, "max-request-size")? {
        config.max_request_size = size;
    }
    if let Some(size) = number(node, "file-size-threshold")? {
        config.file_size_threshold = size;
    }
    Ok(config)
}

fn parse_filter(node: Node<'_, '_>) -> Result<WebAppFilter, DescriptorError> {
    Ok(WebAppFilter {
        name: required(node, "filter-name")?,
        class: child_text(node, "filter-class"),
        init_params: init_params(node)?,
        async_supported: flag(node, "async-supported")?,
    })
}

fn parse_filter_mapping(node: Node<'_, '_>) -> Result<WebAppFilterMapping, DescriptorError> {
    let dispatcher_types = children_text(node, "dispatcher")
        .iter()
        .map(|value| {
            DispatcherType::from_str(value).map_err(|_| DescriptorError::invalid("dispatcher", value))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WebAppFilterMapping {
        filter_name: required(node, "filter-name")?,
        url_patterns: children_text(node, "url-pattern"),
        servlet_names: children_text(node, "servlet-name"),
        dispatcher_types,
    })
}

fn init_params(node: Node<'_, '_>) -> Result<InitParams, DescriptorError> {
    let mut params = InitParams::new();
    for element in elements(node).filter(|n| n.tag_name().name() == "init-param") {
        let (name, value) = param(element)?;
        params.insert(name, value);
    }
    Ok(params)
}

fn param(node: Node<'_, '_>) -> Result<(String, String), DescriptorError> {
    let name = required(node, "param-name")?;
    let value = child(node, "param-value").and_then(text).unwrap_or_default();
    Ok((name, value))
}

fn flag(node: Node<'_, '_>, name: &str) -> Result<bool, DescriptorError> {
    match child_text(node, name) {
        Some(value) => value
            .parse::<bool>()
            .map_err(|_| DescriptorError::invalid(name, &value)),
        None => Ok(false),
    }
}

fn number(node: Node<'_, '_>, name: &str) -> Result<Option<i64>, DescriptorError> {
    child_text(node, name)
        .map(|value| value.parse::<i64>().map_err(|_| DescriptorError::invalid(name, &value)))
        .transpose()
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == name)
}

/// Trimmed text of an element, `None` when empty.
fn text(node: Node<'_, '_>) -> Option<String> {
    let value: String = node
        .children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(text)
}

fn children_text(node: Node<'_, '_>, name: &str) -> Vec<String> {
    elements(node)
        .filter(|n| n.tag_name().name() == name)
        .filter_map(text)
        .collect()
}

fn required(node: Node<'_, '_>, name: &str) -> Result<String, DescriptorError> {
    child_text(node, name).ok_or_else(|| DescriptorError::missing(node.tag_name().name(), name))
}
