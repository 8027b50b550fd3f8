/// Page request as submitted by list endpoints
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32, search: Option<String>) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, 100),
            search: search.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// Paginated response wrapper
#[derive(Debug)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = ((total as f64) / (limit as f64)).ceil() as u32;
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_is_clamped() {
        let page = PageRequest::new(0, 500, Some("  ".into()));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);
        assert!(page.search.is_none());
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let result = PaginatedResult::new(vec![1, 2], 21, 1, 10);
        assert_eq!(result.total_pages, 3);
    }
}
