use crate::Pagination;
use crate::entity::EntityId;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const PAGE_PARAM: &str = "page";
pub const LIMIT_PARAM: &str = "limit";
pub const SEARCH_PARAM: &str = "search";

/// Query parameters sent with a list request. Two requests with equal params
/// share one cache entry.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct QueryParams {
    pagination: Option<Pagination>,
    search: Option<String>,
    extra: BTreeMap<String, String>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paged(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Blank searches are dropped so that `""` and no search share an entry.
    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then_some(search);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.pagination.is_none() && self.search.is_none() && self.extra.is_empty()
    }

    /// The `page`, `limit`, `search` and extra parameters as query string pairs.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(3 + self.extra.len());
        if let Some(pagination) = &self.pagination {
            pairs.push((PAGE_PARAM.to_string(), pagination.page.max(1).to_string()));
            if let Some(page_size) = pagination.page_size {
                pairs.push((LIMIT_PARAM.to_string(), page_size.to_string()));
            }
        }
        if let Some(search) = &self.search {
            pairs.push((SEARCH_PARAM.to_string(), search.clone()));
        }
        pairs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

/// Identifies one cache entry.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum CacheKey {
    Collection {
        resource: &'static str,
        params: QueryParams,
    },
    Entity {
        resource: &'static str,
        id: EntityId,
    },
}

impl CacheKey {
    pub fn resource(&self) -> &'static str {
        match self {
            CacheKey::Collection { resource, .. } | CacheKey::Entity { resource, .. } => *resource,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Collection { resource, params } if params.is_empty() => {
                write!(f, "{resource}")
            }
            CacheKey::Collection { resource, params } => {
                write!(f, "{resource}?")?;
                for (i, (k, v)) in params.to_pairs().iter().enumerate() {
                    if i > 0 {
                        write!(f, "&")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                Ok(())
            }
            CacheKey::Entity { resource, id } => write!(f, "{resource}/{id}"),
        }
    }
}
