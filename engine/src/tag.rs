use crate::entity::EntityId;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// A label used to group cache entries for bulk invalidation.
///
/// A tag without an id names a whole resource type and invalidates every entry carrying
/// a tag of that type. A tag with an id only invalidates entries that carry that exact
/// `(type, id)` pair.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone)]
pub struct Tag {
    kind: Cow<'static, str>,
    id: Option<EntityId>,
}

impl Tag {
    pub const fn new(kind: &'static str) -> Self {
        Self {
            kind: Cow::Borrowed(kind),
            id: None,
        }
    }

    pub fn owned(kind: impl Into<String>) -> Self {
        Self {
            kind: Cow::Owned(kind.into()),
            id: None,
        }
    }

    pub fn entity(kind: impl Into<Cow<'static, str>>, id: EntityId) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn with_id(&self, id: EntityId) -> Self {
        Self {
            kind: self.kind.clone(),
            id: Some(id),
        }
    }

    /// Whether an entry carrying `self` goes stale when `invalidating` is invalidated.
    pub fn invalidated_by(&self, invalidating: &Tag) -> bool {
        self.kind == invalidating.kind
            && (invalidating.id.is_none() || self.id == invalidating.id)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{id}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINES: Tag = Tag::new("Pipelines");

    #[test]
    fn type_tag_invalidates_every_tag_of_that_type() {
        assert!(PIPELINES.invalidated_by(&PIPELINES));
        assert!(PIPELINES.with_id(EntityId::Number(1)).invalidated_by(&PIPELINES));
        assert!(!Tag::new("Holidays").invalidated_by(&PIPELINES));
    }

    #[test]
    fn entity_tag_only_invalidates_the_same_entity() {
        let one = PIPELINES.with_id(EntityId::Number(1));
        let two = PIPELINES.with_id(EntityId::Number(2));

        assert!(one.invalidated_by(&one));
        assert!(!two.invalidated_by(&one));
        assert!(!PIPELINES.invalidated_by(&one));
    }
}
