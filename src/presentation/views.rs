use askama::{Error as AskamaError, Template};

use crate::application::filters::Endpoint;
use crate::application::render::{
    ActiveFiltersContext, Fragment, FragmentRenderer, PageContext, ProductListContext, RenderError,
};

const PRODUCT_LIST_TEMPLATE: &str = "products/list.html";
const ACTIVE_FILTERS_TEMPLATE: &str = "products/active_filters.html";
const PAGE_TEMPLATE: &str = "products/page.html";

/// Path the endpoint is mounted at; pagination and filter links are relative
/// to it.
pub fn endpoint_path(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::Manual => "/products",
        Endpoint::Faceted => "/products/facets",
        Endpoint::Live => "/products/live",
    }
}

fn page_title(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::Manual => "Products",
        Endpoint::Faceted => "Browse products",
        Endpoint::Live => "Live product search",
    }
}

#[derive(Template)]
#[template(path = "products/list.html")]
pub struct ProductListTemplate<'a> {
    pub view: &'a ProductListContext,
    pub base_path: &'static str,
}

#[derive(Template)]
#[template(path = "products/active_filters.html")]
pub struct ActiveFiltersTemplate<'a> {
    pub view: &'a ActiveFiltersContext,
    pub base_path: &'static str,
}

#[derive(Template)]
#[template(path = "products/page.html")]
pub struct PageTemplate<'a> {
    pub view: &'a PageContext,
    pub title: &'static str,
}

fn template_error(template: &'static str, err: AskamaError) -> RenderError {
    RenderError::template(template, err.to_string())
}

/// Fragment renderer backed by the compiled askama templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AskamaRenderer;

impl AskamaRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl FragmentRenderer for AskamaRenderer {
    fn render_fragment(&self, fragment: &Fragment) -> Result<String, RenderError> {
        match fragment {
            Fragment::ProductList(view) => ProductListTemplate {
                view,
                base_path: endpoint_path(view.endpoint),
            }
            .render()
            .map_err(|err| template_error(PRODUCT_LIST_TEMPLATE, err)),
            Fragment::ActiveFilters(view) => ActiveFiltersTemplate {
                view,
                base_path: endpoint_path(view.endpoint),
            }
            .render()
            .map_err(|err| template_error(ACTIVE_FILTERS_TEMPLATE, err)),
            Fragment::Page(view) => PageTemplate {
                view,
                title: page_title(view.endpoint),
            }
            .render()
            .map_err(|err| template_error(PAGE_TEMPLATE, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::{PageNumber, PageWindow};
    use crate::application::render::{ActiveFilter, ProductView};

    fn product(id: i64, name: &str) -> ProductView {
        ProductView {
            id,
            name: name.to_string(),
            category: "Audio".to_string(),
            brand: None,
            status_label: "Active",
            price: "$10.00".to_string(),
            stock: 0,
            in_stock: false,
        }
    }

    #[test]
    fn list_fragment_escapes_names_and_links_pages() {
        let window = PageWindow::resolve(PageNumber::new(2), 1, 3);
        let view = ProductListContext {
            endpoint: Endpoint::Faceted,
            products: vec![product(7, "<b>Amp</b>")],
            window,
            facets: None,
            previous_query: Some("category=1&page=1".to_string()),
            next_query: Some("category=1&page=3".to_string()),
        };

        let html = AskamaRenderer::new()
            .render_fragment(&Fragment::ProductList(view))
            .expect("render list");

        assert!(!html.contains("<b>Amp</b>"));
        assert!(html.contains("&#60;b&#62;Amp&#60;/b&#62;"));
        assert!(html.contains(r#"href="/products/facets?category=1&#38;page=1""#));
        assert!(!html.contains("category=1&page=1"));
        assert!(html.contains(r#"rel="next""#));
        assert!(html.contains("Out of stock"));
    }

    #[test]
    fn empty_list_shows_placeholder_without_links() {
        let view = ProductListContext {
            endpoint: Endpoint::Manual,
            products: Vec::new(),
            window: PageWindow::resolve(PageNumber::new(1), 24, 0),
            facets: None,
            previous_query: None,
            next_query: None,
        };

        let html = AskamaRenderer::new()
            .render_fragment(&Fragment::ProductList(view))
            .expect("render list");

        assert!(html.contains("No products match these filters."));
        assert!(!html.contains("rel=\"prev\""));
        assert!(!html.contains("rel=\"next\""));
    }

    #[test]
    fn active_filters_link_to_their_removal_queries() {
        let view = ActiveFiltersContext {
            endpoint: Endpoint::Live,
            filters: vec![ActiveFilter {
                param: "status",
                value: "active".to_string(),
                label: "Active".to_string(),
                removal_query: "category=2".to_string(),
            }],
        };

        let html = AskamaRenderer::new()
            .render_fragment(&Fragment::ActiveFilters(view))
            .expect("render filters");

        assert!(html.contains(r#"href="/products/live?category=2""#));
        assert!(html.contains("Clear all"));
    }

    #[test]
    fn page_embeds_fragments_verbatim() {
        let view = PageContext {
            endpoint: Endpoint::Manual,
            list_html: "<section>list</section>".to_string(),
            tags_html: "<ul>tags</ul>".to_string(),
        };

        let html = AskamaRenderer::new()
            .render_fragment(&Fragment::Page(view))
            .expect("render page");

        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains("<section>list</section>"));
        assert!(html.contains("<ul>tags</ul>"));
        assert!(html.contains("<title>Products</title>"));
    }
}
