//! Rendering collaborator interface and the contexts it consumes.

use serde::Serialize;
use thiserror::Error;

use crate::application::facets::FacetCounts;
use crate::application::filters::Endpoint;
use crate::application::pagination::PageWindow;
use crate::domain::entities::ProductId;

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("template `{template}` failed to render: {message}")]
    Template {
        template: &'static str,
        message: String,
    },
}

impl RenderError {
    pub fn template(template: &'static str, message: impl Into<String>) -> Self {
        Self::Template {
            template,
            message: message.into(),
        }
    }
}

/// A product row as shown in a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub brand: Option<String>,
    pub status_label: &'static str,
    pub price: String,
    pub stock: u32,
    pub in_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListContext {
    pub endpoint: Endpoint,
    pub products: Vec<ProductView>,
    pub window: PageWindow,
    pub facets: Option<FacetCounts>,
    /// Query string for the previous page, when there is one.
    pub previous_query: Option<String>,
    pub next_query: Option<String>,
}

/// One applied constraint, removable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveFilter {
    pub param: &'static str,
    pub value: String,
    pub label: String,
    /// Canonical query with this one value removed.
    pub removal_query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveFiltersContext {
    pub endpoint: Endpoint,
    pub filters: Vec<ActiveFilter>,
}

/// Full document wrapped around already rendered fragments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContext {
    pub endpoint: Endpoint,
    pub list_html: String,
    pub tags_html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    ProductList(ProductListContext),
    ActiveFilters(ActiveFiltersContext),
    Page(PageContext),
}

impl Fragment {
    pub fn name(&self) -> &'static str {
        match self {
            Fragment::ProductList(_) => "product_list",
            Fragment::ActiveFilters(_) => "active_filters",
            Fragment::Page(_) => "page",
        }
    }
}

/// Turns fragment contexts into markup. Implementations must be deterministic
/// so that identical requests produce byte-identical payloads.
pub trait FragmentRenderer: Send + Sync {
    fn render_fragment(&self, fragment: &Fragment) -> Result<String, RenderError>;
}
