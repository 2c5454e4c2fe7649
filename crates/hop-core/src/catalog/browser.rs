//! Paging, group filtering and host selection over a catalog.

use std::collections::BTreeMap;

use super::{Catalog, HostEntry};
use crate::constants::DEFAULT_GROUP;
use crate::{Error, Result};

/// Browsing state over a [`Catalog`]: current page and group filter.
#[derive(Debug, Clone)]
pub struct Browser {
    catalog: Catalog,
    page: usize,
    group: Option<String>,
}

impl Browser {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            page: 1,
            group: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// 1-based current page.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Filter by group and go back to page 1.
    ///
    /// An empty name or the default group name clears the filter.
    pub fn set_group(&mut self, group: &str) {
        let group = group.trim();
        self.group = if group.is_empty() || group == DEFAULT_GROUP {
            None
        } else {
            Some(group.to_string())
        };
        self.page = 1;
    }

    /// Hosts visible under the current group filter.
    pub fn visible(&self) -> Vec<&HostEntry> {
        self.catalog
            .hosts()
            .iter()
            .filter(|h| self.group.as_deref().is_none_or(|g| h.group == g))
            .collect()
    }

    pub fn page_count(&self) -> usize {
        self.visible().len().div_ceil(self.catalog.page_size).max(1)
    }

    /// Hosts on the current page. A page past the end shows page 1.
    pub fn page_list(&self) -> Vec<&HostEntry> {
        let all = self.visible();
        let size = self.catalog.page_size;
        let mut begin = (self.page - 1) * size;
        if begin >= all.len() {
            begin = 0;
        }
        let end = (begin + size).min(all.len());
        all[begin..end].to_vec()
    }

    /// Advance one page, wrapping to the first after the last.
    pub fn next_page(&mut self) {
        if self.page * self.catalog.page_size >= self.visible().len() {
            self.page = 1;
        } else {
            self.page += 1;
        }
    }

    /// Go back one page, wrapping to the last before the first.
    pub fn prev_page(&mut self) {
        if self.page <= 1 {
            self.page = self.page_count();
        } else {
            self.page -= 1;
        }
    }

    pub fn first_page(&mut self) {
        self.page = 1;
    }

    pub fn last_page(&mut self) {
        self.page = self.page_count();
    }

    /// Resolve operator input to one host.
    ///
    /// An exact name match among visible hosts wins; otherwise a 1-based
    /// index into the current page.
    pub fn select(&self, input: &str) -> Result<&HostEntry> {
        let mut named = self.visible().into_iter().filter(|h| h.name == input);
        if let Some(first) = named.next() {
            if named.next().is_some() {
                return Err(Error::Selection {
                    message: format!("There is a remote server with the same name: {}.", input),
                });
            }
            return Ok(first);
        }

        let page = self.page_list();
        input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| page.get(i).copied())
            .ok_or_else(|| Error::Selection {
                message: format!(
                    "Instruction {:?} is invalid. Please use -h to view the usage guide.",
                    input
                ),
            })
    }

    /// Every group with its host count, sorted by name.
    pub fn groups(&self) -> Vec<(String, usize)> {
        let mut counts = BTreeMap::new();
        for host in self.catalog.hosts() {
            *counts.entry(host.group.clone()).or_insert(0usize) += 1;
        }
        counts.into_iter().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
