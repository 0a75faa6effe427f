//! Read-only catalog access.
//!
//! Product reads are cached using `moka` (5-minute TTL). Orders are never
//! cached: they are fetched once, right after checkout.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use medusa_store_core::{OrderId, ProductId};

use crate::gateway::{CommerceGateway, GatewayError, Order, Product, ProductPage, ProductQuery};

/// Default page size for product listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
}

/// Cached catalog reads over a [`CommerceGateway`].
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    gateway: Arc<dyn CommerceGateway>,
    cache: Cache<String, CacheValue>,
}

impl Catalog {
    /// Create a catalog over a gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn CommerceGateway>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogInner { gateway, cache }),
        }
    }

    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, limit: u32, offset: u32) -> Result<ProductPage, GatewayError> {
        let cache_key = format!("products:{limit}:{offset}");

        if let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let page = self
            .inner
            .gateway
            .list_products(&ProductQuery {
                limit: Some(limit),
                offset: Some(offset),
                handle: None,
            })
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(page.clone()))
            .await;

        Ok(page)
    }

    /// Get a product by its handle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if no product has the handle.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn product_by_handle(&self, handle: &str) -> Result<Product, GatewayError> {
        let cache_key = format!("handle:{handle}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let page = self
            .inner
            .gateway
            .list_products(&ProductQuery {
                limit: Some(1),
                offset: None,
                handle: Some(handle.to_string()),
            })
            .await?;
        let product = page
            .products
            .into_iter()
            .find(|p| p.handle == handle)
            .ok_or_else(|| GatewayError::NotFound(format!("Product not found: {handle}")))?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<Product, GatewayError> {
        let cache_key = format!("product:{product_id}");

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self.inner.gateway.get_product(product_id).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get a placed order (not cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the order is not found or the API request fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn order(&self, order_id: &OrderId) -> Result<Order, GatewayError> {
        self.inner.gateway.get_order(order_id).await
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockGateway, MockOperation, sample_product};

    fn catalog() -> (MockGateway, Catalog) {
        let gateway = MockGateway::new()
            .with_product(sample_product("prod_1", "classic-tee", "variant_1", 2500))
            .with_product(sample_product("prod_2", "coffee-mug", "variant_2", 1200));
        let catalog = Catalog::new(Arc::new(gateway.clone()));
        (gateway, catalog)
    }

    fn count(gateway: &MockGateway, f: impl Fn(&MockOperation) -> bool) -> usize {
        gateway.operations().iter().filter(|op| f(op)).count()
    }

    #[tokio::test]
    async fn test_list_products_is_cached() {
        let (gateway, catalog) = catalog();

        let page = catalog.list_products(DEFAULT_PAGE_SIZE, 0).await.unwrap();
        assert_eq!(page.count, 2);
        catalog.list_products(DEFAULT_PAGE_SIZE, 0).await.unwrap();

        assert_eq!(
            count(&gateway, |op| matches!(op, MockOperation::ListProducts)),
            1
        );
    }

    #[tokio::test]
    async fn test_product_by_handle() {
        let (_gateway, catalog) = catalog();
        let product = catalog.product_by_handle("coffee-mug").await.unwrap();
        assert_eq!(product.id.as_str(), "prod_2");

        let err = catalog.product_by_handle("missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_product_by_id_is_cached_until_invalidated() {
        let (gateway, catalog) = catalog();
        let id = ProductId::new("prod_1");

        catalog.product(&id).await.unwrap();
        catalog.product(&id).await.unwrap();
        let fetches = |gateway: &MockGateway| {
            count(gateway, |op| matches!(op, MockOperation::GetProduct { .. }))
        };
        assert_eq!(fetches(&gateway), 1);

        catalog.invalidate_all().await;
        catalog.product(&id).await.unwrap();
        assert_eq!(fetches(&gateway), 2);
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let (_gateway, catalog) = catalog();
        let err = catalog.order(&OrderId::new("order_x")).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
