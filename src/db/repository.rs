//! Database repository for CRUD and moderation operations.
//!
//! Every mutation that touches a voter or reporter set is a single SQL
//! statement, so concurrent requests on the same product cannot lose updates.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    normalize_email, normalize_tags, Coupon, CreateCouponRequest, CreateReviewRequest, Product, RegisterOutcome,
    RegisterUserRequest, ReportAction, Review, Role, SiteStats, SubmitProductRequest,
    UpdateCouponRequest, UpdateProductRequest, User, ACCEPTED_STATUS, DEFAULT_STATUS,
};

const USER_COLUMNS: &str = "id, email, name, image, role, subscribed, created_at";

const PRODUCT_COLUMNS: &str = "id, owner_email, owner_name, owner_image, name, description, \
     image, link, tags, upvotes, voters, reported, status, is_featured, created_at";

const REVIEW_COLUMNS: &str =
    "id, product_id, user_email, user_name, user_image, description, rating, created_at";

const COUPON_COLUMNS: &str = "id, code, expiry, description, discount, created_at";

/// Newest first; rowid breaks ties between rows created in the same millisecond.
const NEWEST_FIRST: &str = "created_at DESC, rowid DESC";

/// Filter and pagination for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub tag: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY {NEWEST_FIRST}");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = sqlx::query(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Register a user. A second registration for the same email is a no-op.
    pub async fn register_user(
        &self,
        request: &RegisterUserRequest,
    ) -> Result<RegisterOutcome, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let email = normalize_email(&request.email);
        let email = email.as_str();

        let result = sqlx::query(
            "INSERT INTO users (id, email, name, image, role, subscribed, created_at) VALUES (?, ?, ?, ?, NULL, 0, ?) ON CONFLICT(email) DO NOTHING",
        )
        .bind(&id)
        .bind(email)
        .bind(&request.name)
        .bind(&request.image)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        let user = self
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::Internal(format!("User {} vanished after insert", email)))?;

        let message = if inserted {
            "User created"
        } else {
            "User already exists"
        };

        Ok(RegisterOutcome {
            inserted,
            message: message.to_string(),
            user,
        })
    }

    /// Resolve the role for an email, defaulting to `user` when none is stored.
    pub async fn get_role(&self, email: &str) -> Result<Role, AppError> {
        self.get_user_by_email(email)
            .await?
            .map(|u| u.effective_role())
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))
    }

    /// Overwrite a user's role.
    pub async fn set_role(&self, id: &str, role: Role) -> Result<User, AppError> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Set the subscription flag for a user.
    pub async fn set_subscription(&self, email: &str, subscribed: bool) -> Result<User, AppError> {
        let email = normalize_email(email);
        let result = sqlx::query("UPDATE users SET subscribed = ? WHERE email = ?")
            .bind(subscribed as i32)
            .bind(&email)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", email)));
        }

        self.get_user_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))
    }

    // ==================== PRODUCT OPERATIONS ====================

    /// List products, newest first, optionally restricted to one tag.
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            r#"SELECT {PRODUCT_COLUMNS} FROM products
               WHERE ?1 IS NULL
                  OR EXISTS (SELECT 1 FROM json_each(products.tags) WHERE json_each.value = ?1)
               ORDER BY {NEWEST_FIRST}
               LIMIT ?2 OFFSET ?3"#
        );
        let tag = query.tag.as_ref().map(|t| t.trim().to_lowercase());

        let rows = sqlx::query(&sql)
            .bind(tag)
            .bind(query.limit as i64)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// List every product; used to rebuild the search index.
    pub async fn all_products(&self) -> Result<Vec<Product>, AppError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY {NEWEST_FIRST}");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Get a product by ID.
    pub async fn get_product(&self, id: &str) -> Result<Option<Product>, AppError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(product_from_row))
    }

    /// Get a product by ID or fail with `NotFound`.
    pub async fn require_product(&self, id: &str) -> Result<Product, AppError> {
        self.get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    /// Products submitted by one owner.
    pub async fn products_by_owner(&self, email: &str) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_email = ? ORDER BY {NEWEST_FIRST}"
        );
        let rows = sqlx::query(&sql)
            .bind(normalize_email(email))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Insert a product, enforcing the one-free-product quota for unsubscribed owners.
    ///
    /// The quota predicate and the insert run as one statement, so two
    /// concurrent submissions by the same unsubscribed owner cannot both pass.
    pub async fn submit_product(&self, request: &SubmitProductRequest) -> Result<Product, AppError> {
        let email = normalize_email(&request.email);
        let email = email.as_str();
        let owner = self
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let tags = normalize_tags(&request.tags);
        let tags_json = serde_json::to_string(&tags)?;
        let owner_name = request.owner_name.clone().or(owner.name.clone());
        let owner_image = request.owner_image.clone().or(owner.image.clone());

        let result = sqlx::query(
            r#"INSERT INTO products (
                id, owner_email, owner_name, owner_image, name, description, image, link,
                tags, upvotes, voters, reported, status, is_featured, created_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, '[]', '[]', ?10, 0, ?11
            WHERE EXISTS (SELECT 1 FROM users WHERE email = ?2 AND subscribed = 1)
               OR NOT EXISTS (SELECT 1 FROM products WHERE owner_email = ?2)"#,
        )
        .bind(&id)
        .bind(email)
        .bind(&owner_name)
        .bind(&owner_image)
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(&request.image)
        .bind(&request.link)
        .bind(&tags_json)
        .bind(DEFAULT_STATUS)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::info!(owner = %email, "Product submission refused by quota");
            return Err(AppError::Conflict(
                "Unsubscribed users may submit only one product; subscribe to add more"
                    .to_string(),
            ));
        }

        Ok(Product {
            id,
            owner_email: email.to_string(),
            owner_name,
            owner_image,
            name: request.name.trim().to_string(),
            description: request.description.clone(),
            image: request.image.clone(),
            link: request.link.clone(),
            tags,
            upvotes: 0,
            voters: Vec::new(),
            reported: Vec::new(),
            status: DEFAULT_STATUS.to_string(),
            is_featured: false,
            created_at: now,
        })
    }

    /// Edit the descriptive fields of a product.
    pub async fn update_product(
        &self,
        id: &str,
        request: &UpdateProductRequest,
    ) -> Result<Product, AppError> {
        let existing = self.require_product(id).await?;

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or(existing.name.as_str())
            .to_string();
        let description = request
            .description
            .clone()
            .unwrap_or(existing.description.clone());
        let image = request.image.clone().unwrap_or(existing.image.clone());
        let link = request.link.clone().unwrap_or(existing.link.clone());
        let tags = request
            .tags
            .as_ref()
            .map(|t| normalize_tags(t))
            .unwrap_or(existing.tags.clone());
        let tags_json = serde_json::to_string(&tags)?;

        let sql = format!(
            "UPDATE products SET name = ?, description = ?, image = ?, link = ?, tags = ? WHERE id = ? RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&name)
            .bind(&description)
            .bind(&image)
            .bind(&link)
            .bind(&tags_json)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(product_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    /// Delete a product together with its reviews.
    pub async fn delete_product(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Product {} not found", id)));
        }

        let reviews = sqlx::query("DELETE FROM reviews WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(product = %id, reviews = reviews.rows_affected(), "Removed product reviews");
        Ok(())
    }

    // ==================== MODERATION & VOTING ====================

    /// Record an upvote. The counter and the voter set change together or not at all.
    pub async fn upvote(&self, id: &str, email: &str) -> Result<Product, AppError> {
        let email = normalize_email(email);
        let sql = format!(
            r#"UPDATE products
               SET upvotes = upvotes + 1,
                   voters = json_insert(voters, '$[#]', ?1)
               WHERE id = ?2
                 AND NOT EXISTS (SELECT 1 FROM json_each(products.voters) WHERE json_each.value = ?1)
               RETURNING {PRODUCT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(&email)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(product_from_row(&row)),
            None => {
                // Either the product is missing or the email already voted.
                self.require_product(id).await?;
                Err(AppError::Conflict(format!(
                    "{} has already voted for product {}",
                    email, id
                )))
            }
        }
    }

    /// Flip report membership for an email and return the resulting action.
    pub async fn toggle_report(
        &self,
        id: &str,
        email: &str,
    ) -> Result<(ReportAction, Product), AppError> {
        let email = normalize_email(email);
        let sql = format!(
            r#"UPDATE products
               SET reported = CASE
                   WHEN EXISTS (SELECT 1 FROM json_each(products.reported) WHERE json_each.value = ?1)
                   THEN (SELECT json_group_array(json_each.value)
                         FROM json_each(products.reported)
                         WHERE json_each.value <> ?1)
                   ELSE json_insert(reported, '$[#]', ?1)
               END
               WHERE id = ?2
               RETURNING {PRODUCT_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(&email)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))?;

        let product = product_from_row(&row);
        let action = if product.reported.contains(&email) {
            ReportAction::Reported
        } else {
            ReportAction::Unreported
        };

        Ok((action, product))
    }

    /// Products with at least one active report.
    pub async fn reported_products(&self) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE json_array_length(reported) > 0 ORDER BY {NEWEST_FIRST}"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Set the moderation status.
    pub async fn set_status(&self, id: &str, status: &str) -> Result<Product, AppError> {
        let sql = format!("UPDATE products SET status = ? WHERE id = ? RETURNING {PRODUCT_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(status)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(product_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    /// Set or clear the featured flag.
    pub async fn set_featured(&self, id: &str, featured: bool) -> Result<Product, AppError> {
        let sql =
            format!("UPDATE products SET is_featured = ? WHERE id = ? RETURNING {PRODUCT_COLUMNS}");
        let row = sqlx::query(&sql)
            .bind(featured as i32)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(product_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))
    }

    // ==================== RANKING VIEWS ====================

    /// Featured products, newest first.
    pub async fn featured_products(&self, limit: usize) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_featured = 1 ORDER BY {NEWEST_FIRST} LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Most upvoted products; equal counts fall back to newest first.
    pub async fn trending_products(&self, limit: usize) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY upvotes DESC, {NEWEST_FIRST} LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Products with an exact status.
    pub async fn products_by_status(&self, status: &str) -> Result<Vec<Product>, AppError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE status = ? ORDER BY {NEWEST_FIRST}"
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    // ==================== REVIEW OPERATIONS ====================

    /// Append a review for an existing product.
    pub async fn create_review(&self, request: &CreateReviewRequest) -> Result<Review, AppError> {
        self.require_product(&request.product_id).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let user_email = normalize_email(&request.user_email);
        let created_at = match request.created_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => canonical_timestamp(raw)?,
            _ => now_timestamp(),
        };
        let rating = request.rating.unwrap_or_default();

        sqlx::query(
            "INSERT INTO reviews (id, product_id, user_email, user_name, user_image, description, rating, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.product_id)
        .bind(&user_email)
        .bind(&request.user_name)
        .bind(&request.user_image)
        .bind(&request.description)
        .bind(rating)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(Review {
            id,
            product_id: request.product_id.clone(),
            user_email,
            user_name: request.user_name.clone(),
            user_image: request.user_image.clone(),
            description: request.description.clone(),
            rating,
            created_at,
        })
    }

    /// Reviews for one product, newest first.
    pub async fn list_reviews(&self, product_id: &str) -> Result<Vec<Review>, AppError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE product_id = ? ORDER BY {NEWEST_FIRST}"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(review_from_row).collect())
    }

    // ==================== COUPON OPERATIONS ====================

    /// List all coupons.
    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY {NEWEST_FIRST}");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(coupon_from_row).collect())
    }

    /// Get a coupon by ID.
    pub async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>, AppError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(coupon_from_row))
    }

    /// Create a coupon.
    pub async fn create_coupon(&self, request: &CreateCouponRequest) -> Result<Coupon, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();
        let discount = request.discount.unwrap_or_default();

        sqlx::query(
            "INSERT INTO coupons (id, code, expiry, description, discount, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(request.code.trim())
        .bind(&request.expiry)
        .bind(&request.description)
        .bind(discount)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Coupon {
            id,
            code: request.code.trim().to_string(),
            expiry: request.expiry.clone(),
            description: request.description.clone(),
            discount,
            created_at: now,
        })
    }

    /// Update a coupon. Absent fields keep their value.
    pub async fn update_coupon(
        &self,
        id: &str,
        request: &UpdateCouponRequest,
    ) -> Result<Coupon, AppError> {
        let existing = self
            .get_coupon(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Coupon {} not found", id)))?;

        let code = request
            .code
            .as_deref()
            .map(str::trim)
            .unwrap_or(existing.code.as_str())
            .to_string();
        let expiry = request.expiry.clone().unwrap_or(existing.expiry.clone());
        let description = request
            .description
            .clone()
            .unwrap_or(existing.description.clone());
        let discount = request.discount.unwrap_or(existing.discount);

        sqlx::query("UPDATE coupons SET code = ?, expiry = ?, description = ?, discount = ? WHERE id = ?")
            .bind(&code)
            .bind(&expiry)
            .bind(&description)
            .bind(discount)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Coupon {
            id: id.to_string(),
            code,
            expiry,
            description,
            discount,
            created_at: existing.created_at,
        })
    }

    /// Delete a coupon.
    pub async fn delete_coupon(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Coupon {} not found", id)));
        }

        Ok(())
    }

    // ==================== STATS ====================

    /// Aggregate counts for the admin dashboard.
    pub async fn site_stats(&self) -> Result<SiteStats, AppError> {
        let row = sqlx::query(
            r#"SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM products) AS products,
                (SELECT COUNT(*) FROM reviews) AS reviews,
                (SELECT COUNT(*) FROM coupons) AS coupons,
                (SELECT COUNT(*) FROM products WHERE status = ?1) AS accepted_products,
                (SELECT COUNT(*) FROM products WHERE status = ?2) AS pending_products,
                (SELECT COUNT(*) FROM products WHERE status = 'rejected') AS rejected_products"#,
        )
        .bind(ACCEPTED_STATUS)
        .bind(DEFAULT_STATUS)
        .fetch_one(&self.pool)
        .await?;

        Ok(SiteStats {
            users: row.get("users"),
            products: row.get("products"),
            reviews: row.get("reviews"),
            coupons: row.get("coupons"),
            accepted_products: row.get("accepted_products"),
            pending_products: row.get("pending_products"),
            rejected_products: row.get("rejected_products"),
        })
    }
}

/// Current time in the fixed-width format used for every `created_at`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Re-encode a client-supplied RFC 3339 timestamp in the `now_timestamp` format.
pub fn canonical_timestamp(raw: &str) -> Result<String, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| {
            t.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        })
        .map_err(|e| AppError::Validation(format!("Invalid timestamp '{}': {}", raw, e)))
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let subscribed: i32 = row.get("subscribed");
    let role: Option<String> = row.get("role");
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        image: row.get("image"),
        role: role.as_deref().and_then(Role::parse),
        subscribed: subscribed != 0,
        created_at: row.get("created_at"),
    }
}

fn product_from_row(row: &sqlx::sqlite::SqliteRow) -> Product {
    let is_featured: i32 = row.get("is_featured");
    let tags: String = row.get("tags");
    let voters: String = row.get("voters");
    let reported: String = row.get("reported");
    Product {
        id: row.get("id"),
        owner_email: row.get("owner_email"),
        owner_name: row.get("owner_name"),
        owner_image: row.get("owner_image"),
        name: row.get("name"),
        description: row.get("description"),
        image: row.get("image"),
        link: row.get("link"),
        tags: parse_json_array(&tags),
        upvotes: row.get("upvotes"),
        voters: parse_json_array(&voters),
        reported: parse_json_array(&reported),
        status: row.get("status"),
        is_featured: is_featured != 0,
        created_at: row.get("created_at"),
    }
}

fn review_from_row(row: &sqlx::sqlite::SqliteRow) -> Review {
    Review {
        id: row.get("id"),
        product_id: row.get("product_id"),
        user_email: row.get("user_email"),
        user_name: row.get("user_name"),
        user_image: row.get("user_image"),
        description: row.get("description"),
        rating: row.get("rating"),
        created_at: row.get("created_at"),
    }
}

fn coupon_from_row(row: &sqlx::sqlite::SqliteRow) -> Coupon {
    Coupon {
        id: row.get("id"),
        code: row.get("code"),
        expiry: row.get("expiry"),
        description: row.get("description"),
        discount: row.get("discount"),
        created_at: row.get("created_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn test_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    async fn register(repo: &Repository, email: &str) -> User {
        repo.register_user(&RegisterUserRequest {
            email: email.to_string(),
            name: Some("Tester".to_string()),
            image: None,
        })
        .await
        .unwrap()
        .user
    }

    fn submission(email: &str, name: &str) -> SubmitProductRequest {
        SubmitProductRequest {
            email: email.to_string(),
            owner_name: None,
            owner_image: None,
            name: name.to_string(),
            description: "desc".to_string(),
            image: String::new(),
            link: String::new(),
            tags: vec!["tools".to_string()],
        }
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (repo, _dir) = test_repo().await;

        let first = repo
            .register_user(&RegisterUserRequest {
                email: "a@example.com".into(),
                name: None,
                image: None,
            })
            .await
            .unwrap();
        assert!(first.inserted);

        let second = repo
            .register_user(&RegisterUserRequest {
                email: "a@example.com".into(),
                name: Some("Other".into()),
                image: None,
            })
            .await
            .unwrap();
        assert!(!second.inserted);
        assert_eq!(second.user.id, first.user.id);
        assert_eq!(repo.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_defaults_to_user() {
        let (repo, _dir) = test_repo().await;
        let user = register(&repo, "a@example.com").await;

        assert!(user.role.is_none());
        assert_eq!(repo.get_role("a@example.com").await.unwrap(), Role::User);

        repo.set_role(&user.id, Role::Moderator).await.unwrap();
        assert_eq!(
            repo.get_role("a@example.com").await.unwrap(),
            Role::Moderator
        );

        assert!(matches!(
            repo.get_role("missing@example.com").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upvote_rejects_second_vote() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "owner@example.com").await;
        let product = repo
            .submit_product(&submission("owner@example.com", "Widget"))
            .await
            .unwrap();

        let voted = repo.upvote(&product.id, "b@example.com").await.unwrap();
        assert_eq!(voted.upvotes, 1);
        assert_eq!(voted.voters, vec!["b@example.com"]);

        let again = repo.upvote(&product.id, "b@example.com").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let stored = repo.require_product(&product.id).await.unwrap();
        assert_eq!(stored.upvotes, 1);
        assert_eq!(stored.voters.len(), 1);

        let other = repo.upvote(&product.id, "c@example.com").await.unwrap();
        assert_eq!(other.upvotes, 2);
        assert_eq!(other.upvotes as usize, other.voters.len());
    }

    #[tokio::test]
    async fn test_upvote_missing_product() {
        let (repo, _dir) = test_repo().await;
        let result = repo.upvote("nope", "b@example.com").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_upvotes_keep_counter_in_sync() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "owner@example.com").await;
        let product = repo
            .submit_product(&submission("owner@example.com", "Widget"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            let id = product.id.clone();
            // Every voter tries twice
            let email = format!("voter{}@example.com", i % 4);
            handles.push(tokio::spawn(async move { repo.upvote(&id, &email).await }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let stored = repo.require_product(&product.id).await.unwrap();
        assert_eq!(stored.upvotes, 4);
        assert_eq!(stored.voters.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_respect_quota() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.submit_product(&submission("maker@example.com", &format!("P{}", i)))
                    .await
            }));
        }

        let mut accepted = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AppError::Conflict(_)) => refused += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(refused, 7);
        assert_eq!(
            repo.products_by_owner("maker@example.com")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_emails_are_case_insensitive() {
        let (repo, _dir) = test_repo().await;
        let first = register(&repo, "Victim@Example.com").await;
        assert_eq!(first.email, "victim@example.com");

        let again = repo
            .register_user(&RegisterUserRequest {
                email: "victim@example.com".into(),
                name: None,
                image: None,
            })
            .await
            .unwrap();
        assert!(!again.inserted);
        assert_eq!(repo.list_users().await.unwrap().len(), 1);

        let product = repo
            .submit_product(&submission("VICTIM@example.com", "Widget"))
            .await
            .unwrap();
        assert_eq!(product.owner_email, "victim@example.com");

        repo.upvote(&product.id, "Voter@example.com").await.unwrap();
        let repeat = repo.upvote(&product.id, "voter@example.com").await;
        assert!(matches!(repeat, Err(AppError::Conflict(_))));

        let (action, _) = repo
            .toggle_report(&product.id, "Reporter@example.com")
            .await
            .unwrap();
        assert_eq!(action, ReportAction::Reported);
        let (action, cleared) = repo
            .toggle_report(&product.id, "reporter@example.com")
            .await
            .unwrap();
        assert_eq!(action, ReportAction::Unreported);
        assert!(cleared.reported.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_report_is_its_own_inverse() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "owner@example.com").await;
        let product = repo
            .submit_product(&submission("owner@example.com", "Widget"))
            .await
            .unwrap();

        let (action, reported) = repo
            .toggle_report(&product.id, "c@example.com")
            .await
            .unwrap();
        assert_eq!(action, ReportAction::Reported);
        assert_eq!(reported.reported, vec!["c@example.com"]);
        assert_eq!(repo.reported_products().await.unwrap().len(), 1);

        let (action, cleared) = repo
            .toggle_report(&product.id, "c@example.com")
            .await
            .unwrap();
        assert_eq!(action, ReportAction::Unreported);
        assert!(cleared.reported.is_empty());
        assert!(repo.reported_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_report_keeps_other_reporters() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "owner@example.com").await;
        let product = repo
            .submit_product(&submission("owner@example.com", "Widget"))
            .await
            .unwrap();

        repo.toggle_report(&product.id, "c@example.com").await.unwrap();
        repo.toggle_report(&product.id, "d@example.com").await.unwrap();
        let (_, after) = repo
            .toggle_report(&product.id, "c@example.com")
            .await
            .unwrap();
        assert_eq!(after.reported, vec!["d@example.com"]);
    }

    #[tokio::test]
    async fn test_submission_quota() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;

        repo.submit_product(&submission("maker@example.com", "First"))
            .await
            .unwrap();

        let second = repo
            .submit_product(&submission("maker@example.com", "Second"))
            .await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        repo.set_subscription("maker@example.com", true)
            .await
            .unwrap();
        repo.submit_product(&submission("maker@example.com", "Second"))
            .await
            .unwrap();
        repo.submit_product(&submission("maker@example.com", "Third"))
            .await
            .unwrap();

        assert_eq!(
            repo.products_by_owner("maker@example.com")
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_submission_requires_registered_user() {
        let (repo, _dir) = test_repo().await;
        let result = repo
            .submit_product(&submission("ghost@example.com", "Nope"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ranking_views() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;
        repo.set_subscription("maker@example.com", true)
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..8 {
            let product = repo
                .submit_product(&submission("maker@example.com", &format!("P{}", i)))
                .await
                .unwrap();
            ids.push(product.id);
        }

        // Feature five of them; the view must cap at four, newest first.
        for id in &ids[..5] {
            repo.set_featured(id, true).await.unwrap();
        }
        let featured = repo.featured_products(4).await.unwrap();
        assert_eq!(featured.len(), 4);
        assert!(featured.iter().all(|p| p.is_featured));
        let names: Vec<&str> = featured.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["P4", "P3", "P2", "P1"]);

        // P0 gets two votes, P5 one, everyone else ties at zero.
        repo.upvote(&ids[0], "x@example.com").await.unwrap();
        repo.upvote(&ids[0], "y@example.com").await.unwrap();
        repo.upvote(&ids[5], "x@example.com").await.unwrap();

        let trending = repo.trending_products(6).await.unwrap();
        assert_eq!(trending.len(), 6);
        let names: Vec<&str> = trending.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["P0", "P5", "P7", "P6", "P4", "P3"]);

        let again = repo.trending_products(6).await.unwrap();
        let again_names: Vec<&str> = again.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, again_names);
    }

    #[tokio::test]
    async fn test_status_accepts_any_string() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;
        let product = repo
            .submit_product(&submission("maker@example.com", "Widget"))
            .await
            .unwrap();
        assert_eq!(product.status, "pending");

        repo.set_status(&product.id, "accepted").await.unwrap();
        assert_eq!(repo.products_by_status("accepted").await.unwrap().len(), 1);

        let odd = repo.set_status(&product.id, "archived").await.unwrap();
        assert_eq!(odd.status, "archived");
        assert!(repo.products_by_status("accepted").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_products_by_tag() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;
        repo.set_subscription("maker@example.com", true)
            .await
            .unwrap();

        let mut tagged = submission("maker@example.com", "Tagged");
        tagged.tags = vec!["AI".to_string()];
        repo.submit_product(&tagged).await.unwrap();
        repo.submit_product(&submission("maker@example.com", "Plain"))
            .await
            .unwrap();

        let query = ProductQuery {
            tag: Some("ai".to_string()),
            limit: 20,
            offset: 0,
        };
        let found = repo.list_products(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Tagged");

        let all = repo
            .list_products(&ProductQuery {
                tag: None,
                limit: 20,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    fn review(product_id: &str, created_at: Option<&str>) -> CreateReviewRequest {
        CreateReviewRequest {
            product_id: product_id.to_string(),
            user_email: "r@example.com".into(),
            user_name: "R".into(),
            user_image: None,
            description: "nice".into(),
            rating: Some(4),
            created_at: created_at.map(str::to_string),
        }
    }

    #[test]
    fn test_canonical_timestamp() {
        assert_eq!(
            canonical_timestamp("2024-03-01T10:00:00+02:00").unwrap(),
            "2024-03-01T08:00:00.000Z"
        );
        assert_eq!(
            canonical_timestamp("2024-03-01T08:00:00.5Z").unwrap(),
            "2024-03-01T08:00:00.500Z"
        );
        assert!(matches!(
            canonical_timestamp("Fri Mar 01 2024 10:00:00 GMT+0200"),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_review_timestamps_are_canonical() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;
        let product = repo
            .submit_product(&submission("maker@example.com", "Widget"))
            .await
            .unwrap();

        // Later instant written with an offset that would sort first as text.
        repo.create_review(&review(&product.id, Some("2024-03-01T09:00:00Z")))
            .await
            .unwrap();
        let later = repo
            .create_review(&review(&product.id, Some("2024-03-01T11:30:00+02:00")))
            .await
            .unwrap();
        assert_eq!(later.created_at, "2024-03-01T09:30:00.000Z");

        let listed = repo.list_reviews(&product.id).await.unwrap();
        assert_eq!(listed[0].id, later.id);

        let bad = repo
            .create_review(&review(&product.id, Some("yesterday")))
            .await;
        assert!(matches!(bad, Err(AppError::Validation(_))));
        assert_eq!(repo.list_reviews(&product.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_product_removes_reviews() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;
        repo.set_subscription("maker@example.com", true)
            .await
            .unwrap();
        let doomed = repo
            .submit_product(&submission("maker@example.com", "Doomed"))
            .await
            .unwrap();
        let kept = repo
            .submit_product(&submission("maker@example.com", "Kept"))
            .await
            .unwrap();
        repo.create_review(&review(&doomed.id, None)).await.unwrap();
        repo.create_review(&review(&kept.id, None)).await.unwrap();

        repo.delete_product(&doomed.id).await.unwrap();

        assert!(repo.list_reviews(&doomed.id).await.unwrap().is_empty());
        assert_eq!(repo.list_reviews(&kept.id).await.unwrap().len(), 1);
        assert_eq!(repo.site_stats().await.unwrap().reviews, 1);

        assert!(matches!(
            repo.delete_product(&doomed.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_site_stats() {
        let (repo, _dir) = test_repo().await;
        register(&repo, "maker@example.com").await;
        let product = repo
            .submit_product(&submission("maker@example.com", "Widget"))
            .await
            .unwrap();
        repo.create_review(&CreateReviewRequest {
            product_id: product.id.clone(),
            user_email: "r@example.com".into(),
            user_name: "R".into(),
            user_image: None,
            description: "nice".into(),
            rating: Some(5),
            created_at: None,
        })
        .await
        .unwrap();

        let stats = repo.site_stats().await.unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.products, 1);
        assert_eq!(stats.reviews, 1);
        assert_eq!(stats.pending_products, 1);
        assert_eq!(stats.accepted_products, 0);
    }
}
