//! Merchant dashboard API client methods

use super::{ApiClient, ApiRequest, ClientError};
use crate::types::{
    Banner, BannerInput, Branch, BranchInput, Discount, DiscountInput, Order, Page, Product,
    ProductInput, StoreProfile, StoreUpdate,
};

fn page_path(base: &str, page: Option<u32>) -> String {
    match page {
        Some(page) => format!("{base}?page={page}"),
        None => base.to_string(),
    }
}

impl ApiClient {
    /// Get the merchant's store profile
    pub async fn get_store(&self) -> Result<StoreProfile, ClientError> {
        self.get("/store/").await
    }

    /// Update fields of the store profile
    pub async fn update_store(&self, update: &StoreUpdate) -> Result<StoreProfile, ClientError> {
        self.patch("/store/", update).await
    }

    pub async fn list_branches(&self) -> Result<Page<Branch>, ClientError> {
        self.get("/branches/").await
    }

    pub async fn create_branch(&self, branch: &BranchInput) -> Result<Branch, ClientError> {
        self.post("/branches/", branch).await
    }

    pub async fn update_branch(
        &self,
        id: u64,
        branch: &BranchInput,
    ) -> Result<Branch, ClientError> {
        self.patch(&format!("/branches/{id}/"), branch).await
    }

    pub async fn delete_branch(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/branches/{id}/")).await
    }

    /// List catalog products, one page at a time
    pub async fn list_products(&self, page: Option<u32>) -> Result<Page<Product>, ClientError> {
        self.get(&page_path("/products/", page)).await
    }

    pub async fn get_product(&self, id: u64) -> Result<Product, ClientError> {
        self.get(&format!("/products/{id}/")).await
    }

    pub async fn create_product(&self, product: &ProductInput) -> Result<Product, ClientError> {
        self.post("/products/", product).await
    }

    pub async fn update_product(
        &self,
        id: u64,
        product: &ProductInput,
    ) -> Result<Product, ClientError> {
        self.patch(&format!("/products/{id}/"), product).await
    }

    pub async fn delete_product(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/products/{id}/")).await
    }

    /// List orders placed with the store (read-only)
    pub async fn list_orders(&self, page: Option<u32>) -> Result<Page<Order>, ClientError> {
        self.get(&page_path("/orders/", page)).await
    }

    pub async fn get_order(&self, id: u64) -> Result<Order, ClientError> {
        self.get(&format!("/orders/{id}/")).await
    }

    pub async fn list_discounts(&self) -> Result<Page<Discount>, ClientError> {
        self.get("/discounts/").await
    }

    pub async fn create_discount(
        &self,
        discount: &DiscountInput,
    ) -> Result<Discount, ClientError> {
        self.post("/discounts/", discount).await
    }

    pub async fn delete_discount(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/discounts/{id}/")).await
    }

    pub async fn list_banners(&self) -> Result<Page<Banner>, ClientError> {
        self.get("/banners/").await
    }

    pub async fn create_banner(&self, banner: &BannerInput) -> Result<Banner, ClientError> {
        let request = ApiRequest::post("/banners/").json(banner)?;
        self.execute(&request).await
    }

    pub async fn delete_banner(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/banners/{id}/")).await
    }
}
