//! redb-based ledger store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `products` | `product_id` | `Product` | Catalog |
//! | `products_by_sku` | `sku` | `product_id` | SKU uniqueness |
//! | `inventory` | `product_id` | `InventoryRecord` | On-hand / reserved counts |
//! | `reservations` | `order_id` | `Reservation` | Per-order stock earmark |
//! | `customers` | `customer_id` | `Customer` | Customer records |
//! | `addresses` | `address_id` | `Address` | Billing / shipping addresses |
//! | `orders` | `order_id` | `Order` | Orders with their line items |
//! | `payments` | `payment_id` | `Payment` | Payment rows |
//! | `payment_refs` | `reference` | `payment_id` | Gateway reference uniqueness |
//! | `order_payments` | `order_id` | `Vec<payment_id>` | Payments per order |
//! | `status_history` | `(order_id, sequence)` | `StatusHistoryEntry` | Append-only audit |
//! | `coupons` | `code` | `Coupon` | Coupons with usage counter |
//! | `order_coupons` | `order_id` | `Vec<CouponRedemption>` | Order-coupon associations |
//! | `sequence_counter` | `"seq"` | `u64` | Global history sequence |
//!
//! Values are JSON-serialized.
//!
//! # Isolation
//!
//! redb write transactions are serializable: one writer at a time, readers see
//! MVCC snapshots. Every check-then-update in the engine runs inside a single
//! write transaction, so the store itself rules out lost updates.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::models::{
    Address, Coupon, CouponRedemption, Customer, InventoryRecord, Payment, Product, Reservation,
};
use shared::order::{Order, StatusHistoryEntry};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// JSON document table keyed by a string ID
type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const PRODUCTS_TABLE: JsonTable = TableDefinition::new("products");
const INVENTORY_TABLE: JsonTable = TableDefinition::new("inventory");
const RESERVATIONS_TABLE: JsonTable = TableDefinition::new("reservations");
const CUSTOMERS_TABLE: JsonTable = TableDefinition::new("customers");
const ADDRESSES_TABLE: JsonTable = TableDefinition::new("addresses");
const ORDERS_TABLE: JsonTable = TableDefinition::new("orders");
const PAYMENTS_TABLE: JsonTable = TableDefinition::new("payments");
const ORDER_PAYMENTS_TABLE: JsonTable = TableDefinition::new("order_payments");
const COUPONS_TABLE: JsonTable = TableDefinition::new("coupons");
const ORDER_COUPONS_TABLE: JsonTable = TableDefinition::new("order_coupons");

/// Unique index: sku -> product_id
const PRODUCTS_BY_SKU_TABLE: TableDefinition<&str, &str> = TableDefinition::new("products_by_sku");

/// Unique index: payment reference -> payment_id
const PAYMENT_REFS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("payment_refs");

/// Status history: key = (order_id, sequence)
const STATUS_HISTORY_TABLE: TableDefinition<(&str, u64), &[u8]> =
    TableDefinition::new("status_history");

/// Sequence counter: key = "seq"
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const SEQUENCE_KEY: &str = "seq";

const JSON_TABLES: [JsonTable; 10] = [
    PRODUCTS_TABLE,
    INVENTORY_TABLE,
    RESERVATIONS_TABLE,
    CUSTOMERS_TABLE,
    ADDRESSES_TABLE,
    ORDERS_TABLE,
    PAYMENTS_TABLE,
    ORDER_PAYMENTS_TABLE,
    COUPONS_TABLE,
    ORDER_COUPONS_TABLE,
];

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Ledger store backed by redb
#[derive(Clone)]
pub struct LedgerStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for LedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerStore").field("db", &"<redb::Database>").finish()
    }
}

impl LedgerStore {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the write is on disk, and the file is always in a consistent
    /// state (copy-on-write with an atomic root swap).
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, dry runs)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            for def in JSON_TABLES {
                let _ = write_txn.open_table(def)?;
            }
            let _ = write_txn.open_table(PRODUCTS_BY_SKU_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_REFS_TABLE)?;
            let _ = write_txn.open_table(STATUS_HISTORY_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    ///
    /// Dropping the transaction without [`LedgerStore::commit`] discards every
    /// write made through it.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction
    pub fn commit(&self, txn: WriteTransaction) -> StorageResult<()> {
        txn.commit()?;
        Ok(())
    }

    // ========== JSON helpers ==========

    fn read_json<T: DeserializeOwned>(
        &self,
        def: JsonTable,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;
        let value = match table.get(key)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(value)
    }

    fn read_json_txn<T: DeserializeOwned>(
        txn: &WriteTransaction,
        def: JsonTable,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let table = txn.open_table(def)?;
        let value = match table.get(key)? {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(value)
    }

    fn write_json<T: Serialize>(
        txn: &WriteTransaction,
        def: JsonTable,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(def)?;
        let bytes = serde_json::to_vec(value)?;
        table.insert(key, bytes.as_slice())?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, def: JsonTable) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(def)?;

        let mut values = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            values.push(serde_json::from_slice(value.value())?);
        }
        Ok(values)
    }

    // ========== Sequence Operations ==========

    /// Increment and return the global sequence number (within transaction)
    pub fn increment_sequence(&self, txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    /// Get current sequence (read-only)
    pub fn get_current_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Products ==========

    pub fn get_product(&self, product_id: &str) -> StorageResult<Option<Product>> {
        self.read_json(PRODUCTS_TABLE, product_id)
    }

    pub fn get_product_txn(
        &self,
        txn: &WriteTransaction,
        product_id: &str,
    ) -> StorageResult<Option<Product>> {
        Self::read_json_txn(txn, PRODUCTS_TABLE, product_id)
    }

    pub fn store_product(&self, txn: &WriteTransaction, product: &Product) -> StorageResult<()> {
        Self::write_json(txn, PRODUCTS_TABLE, &product.id, product)
    }

    /// Product ID currently owning `sku` (within transaction)
    pub fn find_product_by_sku_txn(
        &self,
        txn: &WriteTransaction,
        sku: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(PRODUCTS_BY_SKU_TABLE)?;
        let owner = table.get(sku)?.map(|guard| guard.value().to_string());
        Ok(owner)
    }

    pub fn set_sku_owner(
        &self,
        txn: &WriteTransaction,
        sku: &str,
        product_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_BY_SKU_TABLE)?;
        table.insert(sku, product_id)?;
        Ok(())
    }

    pub fn remove_sku(&self, txn: &WriteTransaction, sku: &str) -> StorageResult<()> {
        let mut table = txn.open_table(PRODUCTS_BY_SKU_TABLE)?;
        table.remove(sku)?;
        Ok(())
    }

    pub fn get_all_products(&self) -> StorageResult<Vec<Product>> {
        self.scan_json(PRODUCTS_TABLE)
    }

    // ========== Inventory ==========

    pub fn get_inventory(&self, product_id: &str) -> StorageResult<Option<InventoryRecord>> {
        self.read_json(INVENTORY_TABLE, product_id)
    }

    pub fn get_inventory_txn(
        &self,
        txn: &WriteTransaction,
        product_id: &str,
    ) -> StorageResult<Option<InventoryRecord>> {
        Self::read_json_txn(txn, INVENTORY_TABLE, product_id)
    }

    pub fn store_inventory(
        &self,
        txn: &WriteTransaction,
        product_id: &str,
        record: &InventoryRecord,
    ) -> StorageResult<()> {
        Self::write_json(txn, INVENTORY_TABLE, product_id, record)
    }

    /// All inventory rows as `(product_id, record)`
    pub fn get_all_inventory(&self) -> StorageResult<Vec<(String, InventoryRecord)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(INVENTORY_TABLE)?;

        let mut rows = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            let record: InventoryRecord = serde_json::from_slice(value.value())?;
            rows.push((key.value().to_string(), record));
        }
        Ok(rows)
    }

    // ========== Reservations ==========

    pub fn get_reservation(&self, order_id: &str) -> StorageResult<Option<Reservation>> {
        self.read_json(RESERVATIONS_TABLE, order_id)
    }

    pub fn get_reservation_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Reservation>> {
        Self::read_json_txn(txn, RESERVATIONS_TABLE, order_id)
    }

    pub fn store_reservation(
        &self,
        txn: &WriteTransaction,
        reservation: &Reservation,
    ) -> StorageResult<()> {
        Self::write_json(txn, RESERVATIONS_TABLE, &reservation.order_id, reservation)
    }

    pub fn get_all_reservations(&self) -> StorageResult<Vec<Reservation>> {
        self.scan_json(RESERVATIONS_TABLE)
    }

    // ========== Customers & Addresses ==========

    pub fn get_customer(&self, customer_id: &str) -> StorageResult<Option<Customer>> {
        self.read_json(CUSTOMERS_TABLE, customer_id)
    }

    pub fn get_customer_txn(
        &self,
        txn: &WriteTransaction,
        customer_id: &str,
    ) -> StorageResult<Option<Customer>> {
        Self::read_json_txn(txn, CUSTOMERS_TABLE, customer_id)
    }

    pub fn store_customer(&self, txn: &WriteTransaction, customer: &Customer) -> StorageResult<()> {
        Self::write_json(txn, CUSTOMERS_TABLE, &customer.id, customer)
    }

    pub fn get_address(&self, address_id: &str) -> StorageResult<Option<Address>> {
        self.read_json(ADDRESSES_TABLE, address_id)
    }

    pub fn get_address_txn(
        &self,
        txn: &WriteTransaction,
        address_id: &str,
    ) -> StorageResult<Option<Address>> {
        Self::read_json_txn(txn, ADDRESSES_TABLE, address_id)
    }

    pub fn store_address(&self, txn: &WriteTransaction, address: &Address) -> StorageResult<()> {
        Self::write_json(txn, ADDRESSES_TABLE, &address.id, address)
    }

    // ========== Orders ==========

    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        self.read_json(ORDERS_TABLE, order_id)
    }

    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        Self::read_json_txn(txn, ORDERS_TABLE, order_id)
    }

    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        Self::write_json(txn, ORDERS_TABLE, &order.id, order)
    }

    pub fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        self.scan_json(ORDERS_TABLE)
    }

    // ========== Payments ==========

    pub fn get_payment(&self, payment_id: &str) -> StorageResult<Option<Payment>> {
        self.read_json(PAYMENTS_TABLE, payment_id)
    }

    pub fn get_payment_txn(
        &self,
        txn: &WriteTransaction,
        payment_id: &str,
    ) -> StorageResult<Option<Payment>> {
        Self::read_json_txn(txn, PAYMENTS_TABLE, payment_id)
    }

    /// Store a payment row (does not touch the reference or order indexes)
    pub fn store_payment(&self, txn: &WriteTransaction, payment: &Payment) -> StorageResult<()> {
        Self::write_json(txn, PAYMENTS_TABLE, &payment.id, payment)
    }

    /// Insert a new payment and index it by reference and order.
    ///
    /// Returns `false` (and writes nothing) if the reference is already taken.
    pub fn insert_payment(&self, txn: &WriteTransaction, payment: &Payment) -> StorageResult<bool> {
        {
            let mut refs = txn.open_table(PAYMENT_REFS_TABLE)?;
            if refs.get(payment.reference.as_str())?.is_some() {
                return Ok(false);
            }
            refs.insert(payment.reference.as_str(), payment.id.as_str())?;
        }

        self.store_payment(txn, payment)?;

        let mut ids: Vec<String> =
            Self::read_json_txn(txn, ORDER_PAYMENTS_TABLE, &payment.order_id)?.unwrap_or_default();
        ids.push(payment.id.clone());
        Self::write_json(txn, ORDER_PAYMENTS_TABLE, &payment.order_id, &ids)?;
        Ok(true)
    }

    /// Payment ID recorded under a gateway reference
    pub fn find_payment_by_reference(&self, reference: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENT_REFS_TABLE)?;
        let id = table.get(reference)?.map(|guard| guard.value().to_string());
        Ok(id)
    }

    pub fn find_payment_by_reference_txn(
        &self,
        txn: &WriteTransaction,
        reference: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(PAYMENT_REFS_TABLE)?;
        let id = table.get(reference)?.map(|guard| guard.value().to_string());
        Ok(id)
    }

    /// All payments of an order, in insertion order
    pub fn get_payments_for_order(&self, order_id: &str) -> StorageResult<Vec<Payment>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ORDER_PAYMENTS_TABLE)?;
        let payments_table = read_txn.open_table(PAYMENTS_TABLE)?;

        let ids: Vec<String> = match index.get(order_id)? {
            Some(guard) => serde_json::from_slice(guard.value())?,
            None => return Ok(Vec::new()),
        };

        let mut payments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(guard) = payments_table.get(id.as_str())? {
                payments.push(serde_json::from_slice(guard.value())?);
            }
        }
        Ok(payments)
    }

    /// All payments of an order (within transaction)
    pub fn get_payments_for_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<Payment>> {
        let ids: Vec<String> =
            Self::read_json_txn(txn, ORDER_PAYMENTS_TABLE, order_id)?.unwrap_or_default();

        let mut payments = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(payment) = self.get_payment_txn(txn, &id)? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    // ========== Status History ==========

    /// Append a history entry (within transaction)
    pub fn append_history(
        &self,
        txn: &WriteTransaction,
        entry: &StatusHistoryEntry,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(STATUS_HISTORY_TABLE)?;
        let key = (entry.order_id.as_str(), entry.sequence);
        let value = serde_json::to_vec(entry)?;
        table.insert(key, value.as_slice())?;
        Ok(())
    }

    /// History of one order, oldest first
    pub fn get_history_for_order(&self, order_id: &str) -> StorageResult<Vec<StatusHistoryEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(STATUS_HISTORY_TABLE)?;

        let mut entries = Vec::new();
        let range_start = (order_id, 0u64);
        let range_end = (order_id, u64::MAX);

        for result in table.range(range_start..=range_end)? {
            let (_key, value) = result?;
            let entry: StatusHistoryEntry = serde_json::from_slice(value.value())?;
            entries.push(entry);
        }

        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    // ========== Coupons ==========

    pub fn get_coupon(&self, code: &str) -> StorageResult<Option<Coupon>> {
        self.read_json(COUPONS_TABLE, code)
    }

    pub fn get_coupon_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<Coupon>> {
        Self::read_json_txn(txn, COUPONS_TABLE, code)
    }

    pub fn store_coupon(&self, txn: &WriteTransaction, coupon: &Coupon) -> StorageResult<()> {
        Self::write_json(txn, COUPONS_TABLE, &coupon.code, coupon)
    }

    pub fn get_all_coupons(&self) -> StorageResult<Vec<Coupon>> {
        self.scan_json(COUPONS_TABLE)
    }

    /// Coupon associations of an order
    pub fn get_redemptions(&self, order_id: &str) -> StorageResult<Vec<CouponRedemption>> {
        Ok(self
            .read_json(ORDER_COUPONS_TABLE, order_id)?
            .unwrap_or_default())
    }

    pub fn get_redemptions_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Vec<CouponRedemption>> {
        Ok(Self::read_json_txn(txn, ORDER_COUPONS_TABLE, order_id)?.unwrap_or_default())
    }

    pub fn store_redemptions(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        redemptions: &[CouponRedemption],
    ) -> StorageResult<()> {
        Self::write_json(txn, ORDER_COUPONS_TABLE, order_id, &redemptions)
    }

    /// Every order-coupon association in the store
    pub fn get_all_redemptions(&self) -> StorageResult<Vec<CouponRedemption>> {
        let per_order: Vec<Vec<CouponRedemption>> = self.scan_json(ORDER_COUPONS_TABLE)?;
        Ok(per_order.into_iter().flatten().collect())
    }
}
