//! Tantivy-based product search index.
//!
//! Full-text search over product name, tags and description with per-field
//! boosts, optionally restricted to products carrying an exact tag.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Product;

const BOOST_NAME: f32 = 10.0;
const BOOST_TAGS: f32 = 8.0;
const BOOST_DESCRIPTION: f32 = 5.0;

/// Search hit with product ID and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub product_id: String,
    pub score: f32,
}

struct SearchFields {
    product_id: Field,
    name: Field,
    /// Tokenized tags, matched by the text query
    tags: Field,
    /// One untokenized value per tag, for exact filtering
    tag: Field,
    description: Field,
}

/// Tantivy search index for products.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    ///
    /// An index written with a different schema is discarded; the caller
    /// rebuilds it from the database at startup.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        let product_id = schema_builder.add_text_field("product_id", STRING | STORED);
        let name = schema_builder.add_text_field("name", TEXT);
        let tags = schema_builder.add_text_field("tags", TEXT);
        let tag = schema_builder.add_text_field("tag", STRING);
        let description = schema_builder.add_text_field("description", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            product_id,
            name,
            tags,
            tag,
            description,
        };

        let index = match Index::open_in_dir(index_path) {
            Ok(existing) if existing.schema() == schema => existing,
            Ok(_) => {
                tracing::warn!("Search index schema changed; recreating {:?}", index_path);
                std::fs::remove_dir_all(index_path)
                    .and_then(|_| std::fs::create_dir_all(index_path))
                    .map_err(|e| AppError::Search(format!("Failed to reset index: {}", e)))?;
                Index::create_in_dir(index_path, schema)?
            }
            Err(_) => Index::create_in_dir(index_path, schema)?,
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index from the stored products.
    pub async fn rebuild(&self, products: &[Product]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for product in products {
            writer.add_document(self.create_document(product))?;
        }
        writer.commit()?;

        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} products", products.len());
        Ok(())
    }

    /// Index or re-index a single product.
    pub async fn index_product(&self, product: &Product) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.product_id, &product.id));
        writer.add_document(self.create_document(product))?;
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Remove a product from the index.
    pub async fn remove_product(&self, product_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.product_id, product_id));
        writer.commit()?;

        self.reader.reload()?;

        Ok(())
    }

    /// Search for products matching the query, optionally limited to one tag.
    pub fn search(
        &self,
        query_str: &str,
        tag: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let window = offset
            .checked_add(limit)
            .ok_or_else(|| AppError::Validation("Search window is too large".to_string()))?;

        let mut parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.name, self.fields.tags, self.fields.description],
        );
        parser.set_field_boost(self.fields.name, BOOST_NAME);
        parser.set_field_boost(self.fields.tags, BOOST_TAGS);
        parser.set_field_boost(self.fields.description, BOOST_DESCRIPTION);

        let text_query = parser
            .parse_query(query_str)
            .map_err(|e| AppError::Validation(format!("Invalid search query: {}", e)))?;

        let query: Box<dyn Query> = match tag {
            Some(tag) => {
                let tag_query = TermQuery::new(
                    Term::from_field_text(self.fields.tag, tag),
                    IndexRecordOption::Basic,
                );
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, text_query),
                    (Occur::Must, Box::new(tag_query)),
                ]))
            }
            None => text_query,
        };

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(window))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let product_id = doc.get_first(self.fields.product_id)?.as_str()?.to_string();
                Some(SearchResult { product_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, product: &Product) -> TantivyDocument {
        let mut doc = TantivyDocument::new();
        doc.add_text(self.fields.product_id, &product.id);
        doc.add_text(self.fields.name, &product.name);
        doc.add_text(self.fields.tags, product.tags.join(" "));
        for tag in &product.tags {
            doc.add_text(self.fields.tag, tag);
        }
        doc.add_text(self.fields.description, &product.description);
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn product(id: &str, name: &str, tags: &[&str], description: &str) -> Product {
        Product {
            id: id.to_string(),
            owner_email: "maker@example.com".to_string(),
            owner_name: None,
            owner_image: None,
            name: name.to_string(),
            description: description.to_string(),
            image: String::new(),
            link: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            upvotes: 0,
            voters: Vec::new(),
            reported: Vec::new(),
            status: "pending".to_string(),
            is_featured: false,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_search_by_name_and_tag() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let products = vec![
            product("1", "Focus Timer", &["productivity"], "Pomodoro timer"),
            product("2", "Pixel Paint", &["design"], "Sketch in the browser"),
        ];
        index.rebuild(&products).await.unwrap();

        let results = index.search("timer", None, 10, 0).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].product_id, "1");

        let results = index.search("design", None, 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_id, "2");
    }

    #[tokio::test]
    async fn test_reindex_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let mut item = product("1", "Focus Timer", &[], "");
        index.index_product(&item).await.unwrap();

        item.name = "Deep Work".to_string();
        index.index_product(&item).await.unwrap();
        assert!(index.search("timer", None, 10, 0).unwrap().is_empty());
        assert_eq!(index.search("deep", None, 10, 0).unwrap().len(), 1);

        index.remove_product("1").await.unwrap();
        assert!(index.search("deep", None, 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let results = index.search("", None, 10, 0).unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_name_matches_outrank_description_matches() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .rebuild(&[
                product("1", "Notebook", &[], "A timer for your notes"),
                product("2", "Timer", &[], "Counts down"),
            ])
            .await
            .unwrap();

        let results = index.search("timer", None, 10, 0).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].product_id, "2");
    }

    #[tokio::test]
    async fn test_search_with_tag_filter() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        index
            .rebuild(&[
                product("1", "Focus Timer", &["productivity"], ""),
                product("2", "Egg Timer", &["kitchen"], ""),
                product("3", "Open Timer", &["open-source"], ""),
            ])
            .await
            .unwrap();

        let results = index.search("timer", Some("kitchen"), 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_id, "2");

        // Tags are matched whole, not by token
        let results = index.search("timer", Some("open-source"), 10, 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_id, "3");
        assert!(index.search("timer", Some("open"), 10, 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_window_overflow_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open(temp_dir.path()).unwrap();

        let result = index.search("timer", None, 10, usize::MAX);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reopen_keeps_documents() {
        let temp_dir = TempDir::new().unwrap();
        {
            let index = SearchIndex::open(temp_dir.path()).unwrap();
            index
                .index_product(&product("1", "Focus Timer", &[], ""))
                .await
                .unwrap();
        }

        let reopened = SearchIndex::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.search("focus", None, 10, 0).unwrap().len(), 1);
    }
}
