//! Request parameter parsing into normalized filter predicates.
//!
//! Every parameter is parsed independently: a malformed value drops only its
//! own constraint and never fails the request.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;
use url::form_urlencoded;

use crate::domain::buckets::PriceBucket;
use crate::domain::entities::{BrandId, CategoryId, ProductRecord};
use crate::domain::types::{Price, ProductStatus};

pub const PARAM_CATEGORY: &str = "category";
pub const PARAM_BRAND: &str = "brand";
pub const PARAM_STATUS: &str = "status";
pub const PARAM_MIN_PRICE: &str = "min_price";
pub const PARAM_MAX_PRICE: &str = "max_price";
pub const PARAM_PRICE_BUCKET: &str = "price_bucket";
pub const PARAM_PAGE: &str = "page";

/// Raw, possibly repeated query-string parameters in request order.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

impl RawParams {
    pub fn from_query(query: &str) -> Self {
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Every non-blank value supplied for `name`, trimmed, in request order.
    pub fn all<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// The last non-blank value for `name`; repeated single-valued parameters
    /// resolve to the final occurrence.
    pub fn last(&self, name: &str) -> Option<&str> {
        self.all(name).last()
    }
}

/// The listing surfaces, each with a fixed filtering profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// Plain GET form: single-valued filters and an explicit inclusive range.
    Manual,
    /// Checkbox sidebar: multi-valued category/status, bucketed prices, facets.
    Faceted,
    /// Live tag list: everything multi-valued, bucket or range, larger pages.
    Live,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Manual, Endpoint::Faceted, Endpoint::Live];

    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Manual => "manual",
            Endpoint::Faceted => "faceted",
            Endpoint::Live => "live",
        }
    }

    pub fn profile(self) -> EndpointProfile {
        match self {
            Endpoint::Manual => EndpointProfile {
                category: Cardinality::Single,
                brand: Cardinality::Single,
                status: Cardinality::Single,
                price: PriceMode::Range(RangePolicy::INCLUSIVE),
                page_size: 24,
                facets: false,
            },
            Endpoint::Faceted => EndpointProfile {
                category: Cardinality::Multi,
                brand: Cardinality::Single,
                status: Cardinality::Multi,
                price: PriceMode::Bucket,
                page_size: 24,
                facets: true,
            },
            Endpoint::Live => EndpointProfile {
                category: Cardinality::Multi,
                brand: Cardinality::Multi,
                status: Cardinality::Multi,
                price: PriceMode::BucketOrRange(RangePolicy::HALF_OPEN),
                page_size: 32,
                facets: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multi,
}

/// How an endpoint consumes price parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceMode {
    /// Only `min_price`/`max_price`.
    Range(RangePolicy),
    /// Only `price_bucket`.
    Bucket,
    /// A valid `price_bucket` wins; otherwise `min_price`/`max_price`.
    BucketOrRange(RangePolicy),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePolicy {
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

impl RangePolicy {
    pub const INCLUSIVE: RangePolicy = RangePolicy {
        min_inclusive: true,
        max_inclusive: true,
    };
    pub const HALF_OPEN: RangePolicy = RangePolicy {
        min_inclusive: true,
        max_inclusive: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointProfile {
    pub category: Cardinality,
    pub brand: Cardinality,
    pub status: Cardinality,
    pub price: PriceMode,
    pub page_size: u32,
    pub facets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceBound {
    pub value: Price,
    pub inclusive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PriceRange {
    pub min: Option<PriceBound>,
    pub max: Option<PriceBound>,
}

impl PriceRange {
    pub fn contains(&self, price: Price) -> bool {
        let above_min = match self.min {
            Some(bound) if bound.inclusive => price >= bound.value,
            Some(bound) => price > bound.value,
            None => true,
        };
        let below_max = match self.max {
            Some(bound) if bound.inclusive => price <= bound.value,
            Some(bound) => price < bound.value,
            None => true,
        };
        above_min && below_max
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

impl From<PriceBucket> for PriceRange {
    fn from(bucket: PriceBucket) -> Self {
        Self {
            min: Some(PriceBound {
                value: bucket.lower(),
                inclusive: true,
            }),
            max: Some(PriceBound {
                value: bucket.upper(),
                inclusive: bucket.upper_inclusive(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceConstraint {
    Range(PriceRange),
    Bucket(PriceBucket),
}

impl PriceConstraint {
    pub fn range(&self) -> PriceRange {
        match self {
            PriceConstraint::Range(range) => *range,
            PriceConstraint::Bucket(bucket) => PriceRange::from(*bucket),
        }
    }
}

/// Normalized set of active constraints for one request.
///
/// Values are OR-ed within a field and fields are AND-ed together. An empty
/// set means the field is unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FilterPredicate {
    categories: BTreeSet<CategoryId>,
    brands: BTreeSet<BrandId>,
    statuses: BTreeSet<ProductStatus>,
    price: Option<PriceConstraint>,
}

impl FilterPredicate {
    pub fn unfiltered() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &BTreeSet<CategoryId> {
        &self.categories
    }

    pub fn brands(&self) -> &BTreeSet<BrandId> {
        &self.brands
    }

    pub fn statuses(&self) -> &BTreeSet<ProductStatus> {
        &self.statuses
    }

    pub fn price(&self) -> Option<&PriceConstraint> {
        self.price.as_ref()
    }

    pub fn is_unfiltered(&self) -> bool {
        self.categories.is_empty()
            && self.brands.is_empty()
            && self.statuses.is_empty()
            && self.price.is_none()
    }

    /// The same predicate with the price constraint removed; price-bucket
    /// facets are counted against this.
    pub fn without_price(&self) -> Self {
        Self {
            price: None,
            ..self.clone()
        }
    }

    pub fn matches(&self, product: &ProductRecord) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&product.category_id) {
            return false;
        }
        if !self.brands.is_empty()
            && !product
                .brand_id
                .is_some_and(|brand| self.brands.contains(&brand))
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&product.status) {
            return false;
        }
        match &self.price {
            Some(constraint) => constraint.range().contains(product.price),
            None => true,
        }
    }

    /// Parameter pairs sorted by name, then value.
    pub fn canonical_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = Vec::new();
        pairs.extend(self.categories.iter().map(|id| (PARAM_CATEGORY, id.to_string())));
        pairs.extend(self.brands.iter().map(|id| (PARAM_BRAND, id.to_string())));
        pairs.extend(
            self.statuses
                .iter()
                .map(|status| (PARAM_STATUS, status.as_str().to_string())),
        );
        match &self.price {
            Some(PriceConstraint::Bucket(bucket)) => {
                pairs.push((PARAM_PRICE_BUCKET, bucket.token().to_string()));
            }
            Some(PriceConstraint::Range(range)) => {
                if let Some(min) = range.min {
                    pairs.push((PARAM_MIN_PRICE, min.value.to_string()));
                }
                if let Some(max) = range.max {
                    pairs.push((PARAM_MAX_PRICE, max.value.to_string()));
                }
            }
            None => {}
        }
        pairs.sort();
        pairs
    }

    /// Stable query-string form, independent of the original parameter order.
    pub fn canonical_query(&self) -> String {
        encode_pairs(self.canonical_pairs())
    }
}

pub(crate) fn encode_pairs<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}

/// Builds predicates according to an endpoint's profile.
#[derive(Debug, Clone, Copy)]
pub struct PredicateBuilder {
    profile: EndpointProfile,
}

impl PredicateBuilder {
    pub fn new(profile: EndpointProfile) -> Self {
        Self { profile }
    }

    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self::new(endpoint.profile())
    }

    pub fn build(&self, params: &RawParams) -> FilterPredicate {
        let categories = collect_values(params, PARAM_CATEGORY, self.profile.category, |raw| {
            raw.parse::<CategoryId>().ok().filter(|id| *id > 0)
        });
        let brands = collect_values(params, PARAM_BRAND, self.profile.brand, |raw| {
            raw.parse::<BrandId>().ok().filter(|id| *id > 0)
        });
        let statuses = collect_values(params, PARAM_STATUS, self.profile.status, |raw| {
            raw.parse::<ProductStatus>().ok()
        });

        let price = match self.profile.price {
            PriceMode::Range(policy) => range_constraint(params, policy),
            PriceMode::Bucket => bucket_constraint(params),
            PriceMode::BucketOrRange(policy) => {
                bucket_constraint(params).or_else(|| range_constraint(params, policy))
            }
        };

        FilterPredicate {
            categories,
            brands,
            statuses,
            price,
        }
    }
}

fn collect_values<T, F>(
    params: &RawParams,
    name: &'static str,
    cardinality: Cardinality,
    parse: F,
) -> BTreeSet<T>
where
    T: Ord,
    F: Fn(&str) -> Option<T>,
{
    let parse_logged = |raw: &str| {
        let parsed = parse(raw);
        if parsed.is_none() {
            debug!(param = name, value = raw, "dropping malformed filter value");
        }
        parsed
    };

    match cardinality {
        Cardinality::Multi => params.all(name).filter_map(parse_logged).collect(),
        Cardinality::Single => params.last(name).and_then(parse_logged).into_iter().collect(),
    }
}

fn bucket_constraint(params: &RawParams) -> Option<PriceConstraint> {
    let raw = params.last(PARAM_PRICE_BUCKET)?;
    match raw.parse::<PriceBucket>() {
        Ok(bucket) => Some(PriceConstraint::Bucket(bucket)),
        Err(_) => {
            debug!(param = PARAM_PRICE_BUCKET, value = raw, "ignoring unknown price bucket");
            None
        }
    }
}

fn range_constraint(params: &RawParams, policy: RangePolicy) -> Option<PriceConstraint> {
    let parse_bound = |name: &'static str, inclusive: bool| {
        let raw = params.last(name)?;
        match raw.parse::<Price>() {
            Ok(value) => Some(PriceBound { value, inclusive }),
            Err(_) => {
                debug!(param = name, value = raw, "dropping malformed price bound");
                None
            }
        }
    };

    let range = PriceRange {
        min: parse_bound(PARAM_MIN_PRICE, policy.min_inclusive),
        max: parse_bound(PARAM_MAX_PRICE, policy.max_inclusive),
    };

    (!range.is_unbounded()).then_some(PriceConstraint::Range(range))
}
