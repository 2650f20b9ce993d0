//! Listing payload assembly behind the response cache.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::error::AppError;
use crate::application::facets::{FacetAggregator, FacetCounts};
use crate::application::filters::{
    Endpoint, FilterPredicate, PARAM_BRAND, PARAM_CATEGORY, PARAM_MAX_PRICE, PARAM_MIN_PRICE,
    PARAM_PAGE, PARAM_PRICE_BUCKET, PARAM_STATUS, PredicateBuilder, PriceConstraint, RawParams,
    encode_pairs,
};
use crate::application::pagination::{PageNumber, PageWindow};
use crate::application::render::{
    ActiveFilter, ActiveFiltersContext, Fragment, FragmentRenderer, PageContext,
    ProductListContext, ProductView,
};
use crate::application::repos::{CatalogRepo, RepoError};
use crate::cache::{CachePayload, ResponseCache, ResponseKey};
use crate::domain::entities::{BrandId, CategoryId, ProductRecord};

/// One parsed listing request. Built once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    endpoint: Endpoint,
    predicate: FilterPredicate,
    page: PageNumber,
}

impl ListingRequest {
    pub fn new(endpoint: Endpoint, predicate: FilterPredicate, page: PageNumber) -> Self {
        Self {
            endpoint,
            predicate,
            page,
        }
    }

    pub fn from_params(endpoint: Endpoint, params: &RawParams) -> Self {
        Self {
            endpoint,
            predicate: PredicateBuilder::for_endpoint(endpoint).build(params),
            page: PageNumber::parse(params.last(PARAM_PAGE)),
        }
    }

    pub fn from_query(endpoint: Endpoint, query: &str) -> Self {
        Self::from_params(endpoint, &RawParams::from_query(query))
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn predicate(&self) -> &FilterPredicate {
        &self.predicate
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }

    /// Predicate pairs plus the requested page, sorted by name then value.
    pub fn canonical_query(&self) -> String {
        let mut pairs = self.predicate.canonical_pairs();
        pairs.push((PARAM_PAGE, self.page.get().to_string()));
        pairs.sort();
        encode_pairs(pairs)
    }

    pub fn cache_key(&self) -> ResponseKey {
        ResponseKey::listing(self.endpoint, &self.canonical_query())
    }
}

#[derive(Default)]
struct NameIndex {
    categories: HashMap<CategoryId, String>,
    brands: HashMap<BrandId, String>,
}

impl NameIndex {
    fn category(&self, id: CategoryId) -> String {
        self.categories
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Category #{id}"))
    }

    fn brand(&self, id: BrandId) -> String {
        self.brands
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Brand #{id}"))
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepo>,
    facets: FacetAggregator,
    renderer: Arc<dyn FragmentRenderer>,
    cache: Arc<ResponseCache>,
}

impl CatalogService {
    pub fn new(
        repo: Arc<dyn CatalogRepo>,
        renderer: Arc<dyn FragmentRenderer>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            facets: FacetAggregator::new(Arc::clone(&repo)),
            repo,
            renderer,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Listing payload for `request`, served from the response cache when
    /// possible.
    #[instrument(skip_all, fields(endpoint = request.endpoint().as_str()))]
    pub async fn listing(&self, request: &ListingRequest) -> Result<Arc<CachePayload>, AppError> {
        self.cache
            .get_or_compute(request.cache_key(), || self.compute(request))
            .await
    }

    /// Wrap a listing payload into a full document.
    pub fn render_page(
        &self,
        endpoint: Endpoint,
        payload: &CachePayload,
    ) -> Result<String, AppError> {
        let fragment = Fragment::Page(PageContext {
            endpoint,
            list_html: payload.html.clone(),
            tags_html: payload.tags_html.clone(),
        });
        Ok(self.renderer.render_fragment(&fragment)?)
    }

    async fn compute(&self, request: &ListingRequest) -> Result<CachePayload, AppError> {
        let profile = request.endpoint.profile();
        let predicate = &request.predicate;

        let facets = async {
            if profile.facets {
                self.facets.aggregate(predicate).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (total, names, facets) =
            tokio::try_join!(self.repo.count(predicate), self.name_index(), facets)?;

        let window = PageWindow::resolve(request.page, profile.page_size, total);
        let rows = self
            .repo
            .query_page(predicate, window.offset(), window.limit())
            .await?;
        debug!(
            total,
            page = window.number,
            rows = rows.len(),
            "Listing rows loaded"
        );

        let html = self.render_list(request, rows, window, facets.clone(), &names)?;
        let tags_html = self.renderer.render_fragment(&Fragment::ActiveFilters(
            ActiveFiltersContext {
                endpoint: request.endpoint,
                filters: active_filters(predicate, &names),
            },
        ))?;

        Ok(CachePayload {
            html,
            tags_html,
            facets,
        })
    }

    async fn name_index(&self) -> Result<NameIndex, RepoError> {
        let (categories, brands) =
            tokio::try_join!(self.repo.list_categories(), self.repo.list_brands())?;
        Ok(NameIndex {
            categories: categories.into_iter().map(|c| (c.id, c.name)).collect(),
            brands: brands.into_iter().map(|b| (b.id, b.name)).collect(),
        })
    }

    fn render_list(
        &self,
        request: &ListingRequest,
        rows: Vec<ProductRecord>,
        window: PageWindow,
        facets: Option<FacetCounts>,
        names: &NameIndex,
    ) -> Result<String, AppError> {
        let page_query = |number: u64| {
            let mut pairs = request.predicate.canonical_pairs();
            pairs.push((PARAM_PAGE, number.to_string()));
            pairs.sort();
            encode_pairs(pairs)
        };

        let context = ProductListContext {
            endpoint: request.endpoint,
            products: rows.into_iter().map(|row| product_view(row, names)).collect(),
            window,
            facets,
            previous_query: window.previous_number().map(page_query),
            next_query: window.next_number().map(page_query),
        };
        Ok(self
            .renderer
            .render_fragment(&Fragment::ProductList(context))?)
    }
}

fn product_view(row: ProductRecord, names: &NameIndex) -> ProductView {
    ProductView {
        id: row.id,
        category: names.category(row.category_id),
        brand: row.brand_id.map(|id| names.brand(id)),
        status_label: row.status.label(),
        price: row.price.to_string(),
        stock: row.stock,
        in_stock: row.stock > 0,
        name: row.name,
    }
}

/// One tag per applied value, in canonical order.
fn active_filters(predicate: &FilterPredicate, names: &NameIndex) -> Vec<ActiveFilter> {
    let pairs = predicate.canonical_pairs();
    pairs
        .iter()
        .enumerate()
        .map(|(index, (param, value))| {
            let removal_query = encode_pairs(
                pairs
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, (name, value))| (*name, value.clone())),
            );
            ActiveFilter {
                param: *param,
                value: value.clone(),
                label: filter_label(predicate, names, *param, value),
                removal_query,
            }
        })
        .collect()
}

fn filter_label(
    predicate: &FilterPredicate,
    names: &NameIndex,
    param: &'static str,
    value: &str,
) -> String {
    match param {
        PARAM_CATEGORY => value
            .parse()
            .map(|id| names.category(id))
            .unwrap_or_else(|_| value.to_string()),
        PARAM_BRAND => value
            .parse()
            .map(|id| names.brand(id))
            .unwrap_or_else(|_| value.to_string()),
        PARAM_STATUS => predicate
            .statuses()
            .iter()
            .find(|status| status.as_str() == value)
            .map_or_else(|| value.to_string(), |status| status.label().to_string()),
        PARAM_PRICE_BUCKET => match predicate.price() {
            Some(PriceConstraint::Bucket(bucket)) => bucket.label().to_string(),
            _ => value.to_string(),
        },
        PARAM_MIN_PRICE => format!("From {value}"),
        PARAM_MAX_PRICE => format!("Up to {value}"),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::ChangeFeed;
    use crate::domain::entities::ProductDraft;
    use crate::domain::types::Price;
    use crate::infra::memory::InMemoryCatalog;

    #[test]
    fn canonical_query_ignores_parameter_order() {
        let first = ListingRequest::from_query(Endpoint::Live, "status=active&category=2&category=1");
        let second =
            ListingRequest::from_query(Endpoint::Live, "category=1&page=1&status=active&category=2");

        assert_eq!(first.canonical_query(), "category=1&category=2&page=1&status=active");
        assert_eq!(first.cache_key(), second.cache_key());
    }

    #[test]
    fn page_is_part_of_the_cache_key() {
        let first = ListingRequest::from_query(Endpoint::Faceted, "page=1");
        let second = ListingRequest::from_query(Endpoint::Faceted, "page=2");
        let garbage = ListingRequest::from_query(Endpoint::Faceted, "page=abc");

        assert_ne!(first.cache_key(), second.cache_key());
        assert_eq!(first.cache_key(), garbage.cache_key());
    }

    #[test]
    fn active_filters_resolve_names_and_removal_queries() {
        let predicate = PredicateBuilder::for_endpoint(Endpoint::Live).build(&RawParams::from_query(
            "category=4&brand=9&status=inactive&price_bucket=50_100",
        ));
        let names = NameIndex {
            categories: HashMap::from([(4, "Lamps".to_string())]),
            brands: HashMap::new(),
        };

        let filters = active_filters(&predicate, &names);
        let labels: Vec<&str> = filters.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["Brand #9", "Lamps", "50 – 100", "Inactive"]);

        let category = filters
            .iter()
            .find(|f| f.param == PARAM_CATEGORY)
            .expect("category tag");
        assert_eq!(
            category.removal_query,
            "brand=9&price_bucket=50_100&status=inactive"
        );
    }

    #[tokio::test]
    async fn facets_are_only_computed_for_faceted_endpoints() {
        let catalog = Arc::new(InMemoryCatalog::new(Arc::new(ChangeFeed::new())));
        let category = catalog.create_category("Lamps").expect("category").id;
        catalog
            .create_product(ProductDraft::new("Lamp", category, Price::units(20)))
            .expect("product");

        let service = test_service(catalog);
        let manual = service
            .listing(&ListingRequest::from_query(Endpoint::Manual, ""))
            .await
            .expect("manual listing");
        let live = service
            .listing(&ListingRequest::from_query(Endpoint::Live, ""))
            .await
            .expect("live listing");

        assert!(manual.facets.is_none());
        let facets = live.facets.as_ref().expect("live facets");
        assert_eq!(facets.category_count(category), 1);
    }

    fn test_service(catalog: Arc<InMemoryCatalog>) -> CatalogService {
        use crate::cache::{CacheConfig, MemoryStore};
        use crate::presentation::views::AskamaRenderer;

        let config = CacheConfig::default();
        let cache = Arc::new(ResponseCache::new(
            Arc::new(MemoryStore::new(&config)),
            config,
        ));
        CatalogService::new(catalog, Arc::new(AskamaRenderer::new()), cache)
    }
}
