//! Catalog and customer reference data
//!
//! Products, customers and addresses are owned by other services; this is
//! the copy order placement validates against.

use rust_decimal::Decimal;
use shared::models::{Address, Customer, InventoryRecord, Product};
use shared::money::MAX_PRICE;

use super::error::{OrderError, OrderResult};
use super::storage::LedgerStore;

#[derive(Debug, Clone)]
pub struct Catalog {
    storage: LedgerStore,
}

impl Catalog {
    pub fn new(storage: LedgerStore) -> Self {
        Self { storage }
    }

    /// Create or update a product. A new product starts with an empty
    /// inventory row.
    pub fn upsert_product(&self, product: Product) -> OrderResult<Product> {
        validate_product(&product)?;

        let txn = self.storage.begin_write()?;
        if let Some(owner) = self.storage.find_product_by_sku_txn(&txn, &product.sku)?
            && owner != product.id
        {
            return Err(OrderError::constraint(format!(
                "sku {} already belongs to product {}",
                product.sku, owner
            )));
        }

        match self.storage.get_product_txn(&txn, &product.id)? {
            Some(existing) if existing.sku != product.sku => {
                self.storage.remove_sku(&txn, &existing.sku)?;
            }
            Some(_) => {}
            None => {
                if self.storage.get_inventory_txn(&txn, &product.id)?.is_none() {
                    self.storage
                        .store_inventory(&txn, &product.id, &InventoryRecord::default())?;
                }
            }
        }

        self.storage.set_sku_owner(&txn, &product.sku, &product.id)?;
        self.storage.store_product(&txn, &product)?;
        self.storage.commit(txn)?;

        tracing::info!(
            product_id = %product.id,
            sku = %product.sku,
            price = %product.price,
            "Product saved"
        );
        Ok(product)
    }

    pub fn get_product(&self, product_id: &str) -> OrderResult<Product> {
        self.storage
            .get_product(product_id)?
            .ok_or_else(|| OrderError::ProductNotFound(product_id.to_string()))
    }

    pub fn list_products(&self) -> OrderResult<Vec<Product>> {
        Ok(self.storage.get_all_products()?)
    }

    pub fn upsert_customer(&self, customer: Customer) -> OrderResult<Customer> {
        if customer.id.trim().is_empty() {
            return Err(OrderError::constraint("customer id must not be empty"));
        }
        let txn = self.storage.begin_write()?;
        self.storage.store_customer(&txn, &customer)?;
        self.storage.commit(txn)?;
        Ok(customer)
    }

    pub fn get_customer(&self, customer_id: &str) -> OrderResult<Customer> {
        self.storage
            .get_customer(customer_id)?
            .ok_or_else(|| OrderError::CustomerNotFound(customer_id.to_string()))
    }

    /// Save an address; its customer must already exist.
    pub fn upsert_address(&self, address: Address) -> OrderResult<Address> {
        let txn = self.storage.begin_write()?;
        if self
            .storage
            .get_customer_txn(&txn, &address.customer_id)?
            .is_none()
        {
            return Err(OrderError::CustomerNotFound(address.customer_id.clone()));
        }
        self.storage.store_address(&txn, &address)?;
        self.storage.commit(txn)?;
        Ok(address)
    }
}

fn validate_product(product: &Product) -> OrderResult<()> {
    if product.id.trim().is_empty() || product.sku.trim().is_empty() {
        return Err(OrderError::constraint("product id and sku must not be empty"));
    }
    if product.price < Decimal::ZERO {
        return Err(OrderError::constraint(format!(
            "price must be non-negative, got {}",
            product.price
        )));
    }
    if product.price > MAX_PRICE {
        return Err(OrderError::constraint(format!(
            "price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, product.price
        )));
    }
    Ok(())
}
