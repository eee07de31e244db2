use crate::cancel::CancelToken;
use crate::client::NichesClient;
use crate::config::HarvestConfig;
use crate::domain::{CategoryBatch, CategoryFailure, CategoryId, FetchRequest, FetchResult};
use crate::fetcher::CategoryFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub start_offset: u64,
    pub page_size: u64,
    pub max_pages: Option<u32>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            start_offset: 0,
            page_size: 100,
            max_pages: None,
        }
    }
}

impl PaginationConfig {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            start_offset: config.start_offset,
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }
}

pub struct PaginatedCategoryLoader<'a, C> {
    fetcher: &'a CategoryFetcher<C>,
    pagination: PaginationConfig,
}

impl<'a, C: NichesClient> PaginatedCategoryLoader<'a, C> {
    pub fn new(fetcher: &'a CategoryFetcher<C>, pagination: PaginationConfig) -> Self {
        Self {
            fetcher,
            pagination,
        }
    }

    pub fn load(
        &self,
        category: CategoryId,
        cancel: &CancelToken,
    ) -> Result<CategoryBatch, CategoryFailure> {
        let mut batch = CategoryBatch::new(category);
        let mut offset = self.pagination.start_offset;

        loop {
            if let Some(max_pages) = self.pagination.max_pages {
                if batch.payloads.len() >= max_pages as usize {
                    tracing::info!(%category, pages = max_pages, "page limit reached");
                    return Ok(batch);
                }
            }

            match self.fetcher.fetch(FetchRequest::new(category, offset), cancel) {
                FetchResult::Success { bytes } => batch.push(bytes),
                FetchResult::Empty => {
                    tracing::debug!(%category, pages = batch.payloads.len(), "category exhausted");
                    return Ok(batch);
                }
                FetchResult::Failure { kind, message } => {
                    return Err(CategoryFailure::new(kind, message).at_offset(offset));
                }
            }

            offset = match offset.checked_add(self.pagination.page_size) {
                Some(next) => next,
                None => {
                    tracing::warn!(%category, offset, "offset overflow, stopping pagination");
                    return Ok(batch);
                }
            };
        }
    }
}
