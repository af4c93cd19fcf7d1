//! Optional knobs for the post-listing endpoints.

/// Sort direction for post listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Builder for the optional parameters the post-listing endpoints accept.
/// Unset knobs stay off the wire, leaving the server defaults in charge.
///
/// `include` and `exclude` name response fields, letting a caller prune
/// heavy fields like `content` out of list responses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostQuery {
    count: Option<u32>,
    page: Option<u32>,
    post_type: Option<String>,
    order: Option<Order>,
    order_by: Option<String>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PostQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts per page.
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Page number, starting at 1.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Restricts results to a registered post type, `post` and `page`
    /// included.
    #[must_use]
    pub fn with_post_type(mut self, post_type: impl Into<String>) -> Self {
        self.post_type = Some(post_type.into());
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    /// Field posts are sorted by, `date` on the server by default.
    #[must_use]
    pub fn with_order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Response fields to include, all others dropped.
    #[must_use]
    pub fn with_include(mut self, fields: Vec<String>) -> Self {
        self.include = fields;
        self
    }

    /// Response fields to drop.
    #[must_use]
    pub fn with_exclude(mut self, fields: Vec<String>) -> Self {
        self.exclude = fields;
        self
    }

    pub(crate) fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(count) = self.count {
            params.push(("count".to_string(), count.to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(post_type) = &self.post_type {
            params.push(("post_type".to_string(), post_type.clone()));
        }
        if let Some(order) = self.order {
            params.push(("order".to_string(), order.as_str().to_string()));
        }
        if let Some(order_by) = &self.order_by {
            params.push(("orderby".to_string(), order_by.clone()));
        }
        if !self.include.is_empty() {
            params.push(("include".to_string(), self.include.join(",")));
        }
        if !self.exclude.is_empty() {
            params.push(("exclude".to_string(), self.exclude.join(",")));
        }
        params
    }
}
