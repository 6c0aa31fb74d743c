//! Per-site-family heuristics
//!
//! Some sites (job boards mostly) re-render their buttons without any `target`
//! and still open new tabs from script. What identifies their buttons and how a
//! same-tab destination is rebuilt is data, kept in a [`SiteTable`] that can be
//! replaced from JSON without touching the classifier or the interceptor.

use serde::{Deserialize, Serialize};

use crate::dom::{closest, Dom, Selector};
use crate::url::{query_param, resolve};

/// Placeholder for the identifier in [`DestinationRule::path_template`].
pub const ID_PLACEHOLDER: &str = "{id}";

/// Error type for site table loading.
#[derive(Debug, thiserror::Error)]
pub enum SiteTableError {
    #[error("Invalid site table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Site family `{0}` has no host pattern")]
    MissingHostPattern(String),
    #[error("Site family `{0}` has no handled-marker attribute")]
    MissingHandledAttribute(String),
}

/// How to rebuild a same-tab URL from an identifier found in the page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DestinationRule {
    /// Attributes carrying the identifier, in priority order
    pub id_attributes: Vec<String>,
    /// Classes of containers that carry the identifier attributes
    pub container_classes: Vec<String>,
    /// Path on the current origin, with `{id}` substituted
    pub path_template: String,
    /// Query parameter of the current page holding the identifier
    pub query_param: String,
}

/// Where a site-family handler should send the tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteDestination {
    Navigate(String),
    Reload,
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteFamily {
    pub name: String,
    /// Hostname substring, case-insensitive
    pub host_pattern: String,
    /// Substrings of `data-testid` or `id` that mark the family's buttons
    pub markers: Vec<String>,
    /// Classes that mark the family's buttons
    pub marker_classes: Vec<String>,
    /// Elements that get a dedicated click handler
    pub buttons: Vec<Selector>,
    /// HandledMarker attribute set once a handler is installed
    pub handled_attribute: String,
    pub destination: Option<DestinationRule>,
}

impl SiteFamily {
    pub fn applies_to(&self, hostname: &str) -> bool {
        let pattern = self.host_pattern.trim();
        !pattern.is_empty() && hostname.to_ascii_lowercase().contains(&pattern.to_ascii_lowercase())
    }

    /// Whether `data-testid`/`id` contains a marker, or a marker class is present.
    pub fn has_marker<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        let ids = [dom.attribute(node, "data-testid"), dom.attribute(node, "id")];
        let by_id = self.markers.iter().filter(|m| !m.is_empty()).any(|marker| {
            ids.iter()
                .flatten()
                .any(|value| value.contains(marker.as_str()))
        });
        by_id || self.marker_classes.iter().any(|class| dom.has_class(node, class))
    }

    /// Whether the element is one of this family's buttons.
    pub fn claims<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        self.has_marker(dom, node)
            || dom.has_attribute(node, &self.handled_attribute)
            || self.buttons.iter().any(|selector| selector.matches(dom, node))
    }

    pub fn is_handled<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        dom.has_attribute(node, &self.handled_attribute)
    }

    /// Same-tab destination for a click on `node` while the page is at `page_url`.
    pub fn destination_for<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node, page_url: &str) -> SiteDestination {
        let Some(rule) = &self.destination else {
            return match dom.resolved_href(node) {
                Some(href) => SiteDestination::Navigate(href),
                None => SiteDestination::Nothing,
            };
        };

        if let Some(id) = self.identifier_near(dom, node, rule) {
            return SiteDestination::Navigate(build_url(rule, page_url, &id));
        }

        if let Some(id) = query_param(page_url, &rule.query_param) {
            return SiteDestination::Navigate(build_url(rule, page_url, &id));
        }

        SiteDestination::Reload
    }

    /// Destination built only from identifiers on the element or its ancestors.
    pub fn identifier_destination<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node, page_url: &str) -> Option<String> {
        let rule = self.destination.as_ref()?;
        let holder = closest(dom, node, |n| first_identifier(dom, n, rule).is_some())?;
        let id = first_identifier(dom, &holder, rule)?;
        Some(build_url(rule, page_url, &id))
    }

    fn identifier_near<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node, rule: &DestinationRule) -> Option<String> {
        let container = closest(dom, node, |n| first_identifier(dom, n, rule).is_some())
            .or_else(|| {
                closest(dom, node, |n| rule.container_classes.iter().any(|class| dom.has_class(n, class)))
            })
            .or_else(|| {
                rule.id_attributes.iter().find_map(|attr| {
                    dom.query_document(&Selector::any().with_attr(attr)).into_iter().next()
                })
            })?;
        first_identifier(dom, &container, rule)
    }

    fn validate(&self) -> Result<(), SiteTableError> {
        if self.host_pattern.trim().is_empty() {
            return Err(SiteTableError::MissingHostPattern(self.name.clone()));
        }
        if self.handled_attribute.trim().is_empty() {
            return Err(SiteTableError::MissingHandledAttribute(self.name.clone()));
        }
        Ok(())
    }
}

fn first_identifier<D: Dom + ?Sized>(dom: &D, node: &D::Node, rule: &DestinationRule) -> Option<String> {
    rule.id_attributes
        .iter()
        .filter_map(|attr| dom.attribute(node, attr))
        .find(|value| !value.trim().is_empty())
}

fn build_url(rule: &DestinationRule, page_url: &str, id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
    resolve(page_url, &rule.path_template.replace(ID_PLACEHOLDER, &encoded))
}

// =============================================================================
// Site Table
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTable {
    pub families: Vec<SiteFamily>,
}

impl SiteTable {
    pub fn empty() -> Self {
        Self { families: Vec::new() }
    }

    pub fn from_json(json: &str) -> Result<Self, SiteTableError> {
        let table: Self = serde_json::from_str(json)?;
        for family in &table.families {
            family.validate()?;
        }
        Ok(table)
    }

    /// Families whose host pattern matches `hostname`.
    pub fn active<'a>(&'a self, hostname: &'a str) -> impl Iterator<Item = &'a SiteFamily> + 'a {
        self.families.iter().filter(move |family| family.applies_to(hostname))
    }

    /// Job-site markers of every family. Embedded apply widgets show up on
    /// third-party pages, so these are not limited to the family's own host.
    pub fn markers(&self) -> Vec<String> {
        self.families
            .iter()
            .flat_map(|family| family.markers.iter().cloned())
            .filter(|marker| !marker.is_empty())
            .collect()
    }

    /// First active family that claims `node`.
    pub fn claiming<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node, hostname: &str) -> Option<&SiteFamily> {
        self.families
            .iter()
            .filter(|family| family.applies_to(hostname))
            .find(|family| family.claims(dom, node))
    }
}

impl Default for SiteTable {
    fn default() -> Self {
        let indeed = SiteFamily {
            name: "indeed".to_string(),
            host_pattern: "indeed.com".to_string(),
            markers: vec!["indeedApplyButton".to_string()],
            marker_classes: vec!["css-a75pkb".to_string()],
            buttons: vec![
                Selector::tag("button").with_attr_equals("data-testid", "indeedApplyButton-test"),
                Selector::tag("button").with_attr_equals("id", "indeedApplyButton"),
                Selector::tag("button").with_attr_contains("aria-label", "Apply now opens in a new tab"),
                Selector::tag("button").with_attr_contains("aria-label", "new tab"),
                Selector::tag("button").with_attr_contains("aria-label", "Apply now"),
                Selector::tag("button").within("jobsearch-IndeedApplyButton"),
                Selector::tag("button").with_class("css-a75pkb"),
            ],
            handled_attribute: "data-indeed-handler-added".to_string(),
            destination: Some(DestinationRule {
                id_attributes: vec!["data-jk".to_string(), "data-jobkey".to_string()],
                container_classes: vec!["job_seen_beacon".to_string()],
                path_template: "/viewjob?jk={id}".to_string(),
                query_param: "jk".to_string(),
            }),
        };

        let linkedin = SiteFamily {
            name: "linkedin".to_string(),
            host_pattern: "linkedin.com".to_string(),
            markers: Vec::new(),
            marker_classes: Vec::new(),
            buttons: vec![
                Selector::tag("a").with_attr_equals("target", "_blank"),
                Selector::tag("button").with_attr_contains("aria-label", "new tab"),
            ],
            handled_attribute: "data-linkedin-handler-added".to_string(),
            destination: None,
        };

        Self {
            families: vec![indeed, linkedin],
        }
    }
}
