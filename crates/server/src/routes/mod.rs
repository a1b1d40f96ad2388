pub mod admin;
pub mod artisans;
pub mod assignments;
pub mod bookings;
pub mod health;
pub mod leads;
pub mod notifications;
pub mod reviews;

/// Clamp `page`/`per_page` query params into a LIMIT/OFFSET window.
pub(crate) fn page_window(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    (per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::page_window;

    #[test]
    fn test_page_window_defaults() {
        assert_eq!(page_window(None, None), (20, 0));
    }

    #[test]
    fn test_page_window_clamps() {
        assert_eq!(page_window(Some(0), Some(500)), (100, 0));
        assert_eq!(page_window(Some(3), Some(10)), (10, 20));
    }
}
