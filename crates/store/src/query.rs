use serde_json::Value as JsonValue;

/// List ordering. Ties break on record id for determinism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
}

/// Query options for `list`/`count`.
///
/// Filters are equality matches on top-level payload fields. The structural
/// project filter is *not* expressible here; scoping is applied by the store
/// before any of this.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub offset: usize,
    pub limit: usize,
    pub include_deleted: bool,
    pub order: SortOrder,
    pub filters: Vec<(String, JsonValue)>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
            include_deleted: false,
            order: SortOrder::default(),
            filters: Vec::new(),
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}
