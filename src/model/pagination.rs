//! Sort/page coordination for the catalog view
//!
//! Every change of sort key or page number produces a [`PageRequest`] stamped
//! with a new generation. Results are applied only if they belong to the latest
//! generation, so a slow response for an old page can never overwrite a newer one.

use crate::error::AppError;

use super::catalog::CatalogPage;
use super::types::SortKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub sort: SortKey,
    pub page: u32,
}

#[derive(Debug)]
pub enum PageOutcome {
    Applied,
    /// The load failed; the previously displayed page is kept
    Failed(AppError),
    /// A newer request superseded this one
    Stale,
}

pub struct Pagination {
    sort: SortKey,
    page: u32,
    generation: u64,
    current: CatalogPage,
    loading: bool,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            sort: SortKey::default(),
            page: 1,
            generation: 0,
            current: CatalogPage::empty(SortKey::default(), 1, page_size),
            loading: false,
        }
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn current(&self) -> &CatalogPage {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut CatalogPage {
        &mut self.current
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn total_pages(&self) -> u32 {
        self.current.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        (self.page as u64) * (self.current.page_size as u64) < self.current.total_count
    }

    /// Reload the current sort/page
    pub fn reload(&mut self) -> PageRequest {
        self.generation += 1;
        self.loading = true;
        PageRequest {
            generation: self.generation,
            sort: self.sort,
            page: self.page,
        }
    }

    /// Change the sort key. The page number is kept as it is.
    pub fn set_sort(&mut self, sort: SortKey) -> Option<PageRequest> {
        if sort == self.sort {
            return None;
        }
        tracing::debug!(from = ?self.sort, to = ?sort, page = self.page, "Sort key changed");
        self.sort = sort;
        Some(self.reload())
    }

    /// Jump to `page`; pages outside `[1, total_pages]` are rejected once a total is known
    pub fn set_page(&mut self, page: u32) -> Option<PageRequest> {
        let total_pages = self.total_pages();
        if page < 1 || page == self.page || (total_pages > 0 && page > total_pages) {
            return None;
        }
        self.page = page;
        Some(self.reload())
    }

    pub fn next_page(&mut self) -> Option<PageRequest> {
        if !self.has_next() {
            return None;
        }
        self.set_page(self.page + 1)
    }

    pub fn previous_page(&mut self) -> Option<PageRequest> {
        if !self.has_previous() {
            return None;
        }
        self.set_page(self.page - 1)
    }

    pub fn apply(
        &mut self,
        request: PageRequest,
        result: Result<CatalogPage, AppError>,
    ) -> PageOutcome {
        if request.generation != self.generation {
            tracing::debug!(
                stale = request.generation,
                current = self.generation,
                page = request.page,
                "Dropping superseded catalog response"
            );
            return PageOutcome::Stale;
        }

        self.loading = false;
        match result {
            Ok(page) => {
                self.current = page;
                PageOutcome::Applied
            }
            Err(e) => {
                // Point back at what is still on screen
                self.sort = self.current.sort;
                self.page = self.current.page;
                PageOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::model::catalog::PAGE_SIZE;

    fn loaded(request: PageRequest, total: u64) -> CatalogPage {
        let mut page = CatalogPage::empty(request.sort, request.page, PAGE_SIZE);
        page.total_count = total;
        page
    }

    #[test]
    fn stale_response_is_dropped() {
        let mut pagination = Pagination::new(PAGE_SIZE);
        let first = pagination.reload();
        pagination.apply(first, Ok(loaded(first, 40)));

        let to_page_two = pagination.set_page(2).unwrap();
        let to_page_three = pagination.set_page(3).unwrap();

        assert!(matches!(
            pagination.apply(to_page_three, Ok(loaded(to_page_three, 40))),
            PageOutcome::Applied
        ));
        assert!(matches!(
            pagination.apply(to_page_two, Ok(loaded(to_page_two, 40))),
            PageOutcome::Stale
        ));
        assert_eq!(pagination.current().page, 3);
        assert!(!pagination.is_loading());
    }

    #[test]
    fn sort_change_keeps_page_number() {
        let mut pagination = Pagination::new(PAGE_SIZE);
        let first = pagination.reload();
        pagination.apply(first, Ok(loaded(first, 27)));
        let second = pagination.set_page(2).unwrap();
        pagination.apply(second, Ok(loaded(second, 27)));

        let request = pagination.set_sort(SortKey::LikesCount).unwrap();
        assert_eq!(request.page, 2);
        assert_eq!(request.sort, SortKey::LikesCount);
        assert!(pagination.set_sort(SortKey::LikesCount).is_none());
    }

    #[test]
    fn failure_keeps_previous_page() {
        let mut pagination = Pagination::new(PAGE_SIZE);
        let first = pagination.reload();
        pagination.apply(first, Ok(loaded(first, 27)));

        let next = pagination.next_page().unwrap();
        let outcome = pagination.apply(next, Err(AppError::Backend(BackendError::Timeout)));

        assert!(matches!(outcome, PageOutcome::Failed(_)));
        assert_eq!(pagination.current().page, 1);
        assert_eq!(pagination.current().total_count, 27);
        assert_eq!(pagination.page(), 1);
        assert!(!pagination.is_loading());
    }

    #[test]
    fn navigation_is_bounded() {
        let mut pagination = Pagination::new(PAGE_SIZE);
        let first = pagination.reload();
        pagination.apply(first, Ok(loaded(first, 27)));

        assert_eq!(pagination.total_pages(), 3);
        assert!(pagination.previous_page().is_none());
        assert!(pagination.set_page(4).is_none());
        assert!(pagination.set_page(0).is_none());

        let third = pagination.set_page(3).unwrap();
        pagination.apply(third, Ok(loaded(third, 27)));
        assert!(!pagination.has_next());
        assert!(pagination.next_page().is_none());
        assert!(pagination.has_previous());
    }
}
