use std::sync::Arc;

use sea_orm::{
    sea_query::{Expr, LikeExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use slog::Logger;
use tracing::instrument;

use crate::{
    db::DbPool,
    entities::{
        purchase_order::{self, Entity as PurchaseOrder},
        vendor::{self, Column as VendorColumn, Entity as Vendor},
    },
    errors::ServiceError,
};

/// Fields accepted when creating or replacing a vendor
#[derive(Debug, Clone)]
pub struct VendorInput {
    pub name: String,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Case folding shared by stored keys and incoming terms, so both sides
/// compare the same way whatever the database's own `lower()` does.
fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

const SEARCH_SEPARATOR: &str = "\n";

impl VendorInput {
    fn name_key(&self) -> String {
        fold(&self.name)
    }

    fn email_key(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(fold)
            .filter(|email| !email.is_empty())
    }

    fn search_text(&self) -> String {
        [
            Some(self.name.as_str()),
            self.address.as_deref(),
            self.contact_person.as_deref(),
            self.email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(fold)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(SEARCH_SEPARATOR)
    }
}

fn duplicate_vendor_message(input: &VendorInput) -> String {
    format!("A vendor named '{}' or with the same email already exists", input.name)
}

/// Vendor records: CRUD with case-insensitive unique name and email
#[derive(Clone)]
pub struct VendorService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

const LIKE_ESCAPE: char = '!';

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl VendorService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<vendor::Model>, ServiceError> {
        Ok(Vendor::find()
            .order_by_asc(VendorColumn::Name)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<vendor::Model>, ServiceError> {
        Ok(Vendor::find_by_id(id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, id: i32) -> Result<bool, ServiceError> {
        let count = Vendor::find()
            .filter(VendorColumn::Id.eq(id))
            .count(&*self.db_pool)
            .await?;
        Ok(count > 0)
    }

    /// Blank terms return every vendor. Otherwise name, address, contact
    /// person and email match case-insensitively and phone matches as typed.
    #[instrument(skip(self))]
    pub async fn search(&self, term: &str) -> Result<Vec<vendor::Model>, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return self.list().await;
        }

        let folded = LikeExpr::new(escape_like(&fold(term))).escape(LIKE_ESCAPE);
        let exact = LikeExpr::new(escape_like(term)).escape(LIKE_ESCAPE);

        let vendors = Vendor::find()
            .filter(
                Condition::any()
                    .add(Expr::col((Vendor, VendorColumn::SearchText)).like(folded))
                    .add(Expr::col((Vendor, VendorColumn::Phone)).like(exact)),
            )
            .order_by_asc(VendorColumn::Name)
            .all(&*self.db_pool)
            .await?;

        slog::debug!(self.logger, "Vendor search"; "term" => term, "matches" => vendors.len());
        Ok(vendors)
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: VendorInput) -> Result<vendor::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        self.ensure_unique(&txn, &input, None).await?;

        let created = vendor::ActiveModel {
            name_key: Set(input.name_key()),
            email_key: Set(input.email_key()),
            search_text: Set(input.search_text()),
            name: Set(input.name.clone()),
            address: Set(input.address.clone()),
            contact_person: Set(input.contact_person.clone()),
            phone: Set(input.phone.clone()),
            email: Set(input.email.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_write_error(e, duplicate_vendor_message(&input)))?;

        txn.commit().await?;

        slog::info!(self.logger, "Vendor created"; "vendor_id" => created.id, "name" => &created.name);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i32, input: VendorInput) -> Result<vendor::Model, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let existing = Vendor::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor with ID {} not found", id)))?;

        self.ensure_unique(&txn, &input, Some(id)).await?;

        let mut active: vendor::ActiveModel = existing.into();
        active.name_key = Set(input.name_key());
        active.email_key = Set(input.email_key());
        active.search_text = Set(input.search_text());
        active.name = Set(input.name.clone());
        active.address = Set(input.address.clone());
        active.contact_person = Set(input.contact_person.clone());
        active.phone = Set(input.phone.clone());
        active.email = Set(input.email.clone());
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_error(e, duplicate_vendor_message(&input)))?;

        txn.commit().await?;

        slog::info!(self.logger, "Vendor updated"; "vendor_id" => id);
        Ok(updated)
    }

    /// `Ok(false)` when the vendor does not exist; a validation error while
    /// any purchase order still references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let Some(existing) = Vendor::find_by_id(id).one(&txn).await? else {
            slog::warn!(self.logger, "Vendor not found for deletion"; "vendor_id" => id);
            return Ok(false);
        };

        let orders = PurchaseOrder::find()
            .filter(purchase_order::Column::VendorId.eq(id))
            .count(&txn)
            .await?;
        if orders > 0 {
            slog::warn!(self.logger, "Vendor in use"; "vendor_id" => id, "orders" => orders);
            return Err(ServiceError::ValidationError(format!(
                "Cannot delete vendor '{}' because it has purchase orders",
                existing.name
            )));
        }

        Vendor::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        slog::info!(self.logger, "Vendor deleted"; "vendor_id" => id);
        Ok(true)
    }

    async fn ensure_unique<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: &VendorInput,
        exclude_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        let mut by_name = Vendor::find().filter(VendorColumn::NameKey.eq(input.name_key()));
        if let Some(id) = exclude_id {
            by_name = by_name.filter(VendorColumn::Id.ne(id));
        }
        if by_name.one(conn).await?.is_some() {
            slog::warn!(self.logger, "Duplicate vendor name"; "name" => &input.name);
            return Err(ServiceError::ValidationError(format!(
                "A vendor named '{}' already exists",
                input.name
            )));
        }

        if let Some(email) = input.email_key() {
            let mut by_email = Vendor::find().filter(VendorColumn::EmailKey.eq(email.as_str()));
            if let Some(id) = exclude_id {
                by_email = by_email.filter(VendorColumn::Id.ne(id));
            }
            if by_email.one(conn).await?.is_some() {
                slog::warn!(self.logger, "Duplicate vendor email"; "email" => &email);
                return Err(ServiceError::ValidationError(format!(
                    "A vendor with email '{}' already exists",
                    email
                )));
            }
        }

        Ok(())
    }
}
