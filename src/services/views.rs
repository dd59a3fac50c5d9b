//! 由镜像快照派生的只读视图
//!
//! 这些函数都是纯函数：输入同一个快照，输出总是相同。

use std::collections::BTreeMap;

use crate::models::{
    category::CategorySummary,
    notification::{Notification, NotificationView},
    product::{DashboardStats, Product},
    response::PaginatedResult,
};

/// 仪表盘低库存预览条数
pub const LOW_STOCK_PREVIEW: usize = 5;

/// 按名称或 ID 过滤（不区分大小写）；空查询返回全部
pub fn search_products<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    if query.is_empty() {
        return products.iter().collect();
    }
    let needle = query.to_lowercase();
    products
        .iter()
        .filter(|p| {
            p.product_name.to_lowercase().contains(&needle)
                || p.product_id.to_lowercase().contains(&needle)
        })
        .collect()
}

/// 分页游标
///
/// 页码从 1 开始，始终落在 `[1, max(1, total_pages)]` 之间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    per_page: usize,
}

impl Pager {
    pub fn new(per_page: usize) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn total_pages(&self, total: usize) -> usize {
        (total + self.per_page - 1) / self.per_page
    }

    fn last_page(&self, total: usize) -> usize {
        self.total_pages(total).max(1)
    }

    pub fn go_to(&mut self, page: usize, total: usize) {
        self.page = page.clamp(1, self.last_page(total));
    }

    pub fn next(&mut self, total: usize) {
        if self.page < self.total_pages(total) {
            self.page += 1;
        }
    }

    pub fn prev(&mut self) {
        if self.page > 1 {
            self.page -= 1;
        }
    }

    pub fn slice<T: Clone>(&self, items: &[T]) -> PaginatedResult<T> {
        let total = items.len();
        let total_pages = self.total_pages(total);
        let page = self.page.clamp(1, self.last_page(total));
        let start = ((page - 1) * self.per_page).min(total);
        let end = (start + self.per_page).min(total);

        PaginatedResult {
            data: items[start..end].to_vec(),
            total,
            page,
            per_page: self.per_page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// 搜索后分页
pub fn product_page(
    products: &[Product],
    search: Option<&str>,
    page: usize,
    per_page: usize,
) -> PaginatedResult<Product> {
    let filtered: Vec<Product> = search_products(products, search.unwrap_or(""))
        .into_iter()
        .cloned()
        .collect();
    let mut pager = Pager::new(per_page);
    pager.go_to(page, filtered.len());
    pager.slice(&filtered)
}

pub fn low_stock(products: &[Product], threshold: f64) -> Vec<&Product> {
    products.iter().filter(|p| p.is_low_stock(threshold)).collect()
}

pub fn dashboard_stats(products: &[Product], threshold: f64) -> DashboardStats {
    let low = low_stock(products, threshold);
    DashboardStats {
        total_products: products.len(),
        total_categories: derive_categories(products).len(),
        low_stock_count: low.len(),
        low_stock_threshold: threshold,
        low_stock_preview: low.into_iter().take(LOW_STOCK_PREVIEW).cloned().collect(),
    }
}

/// 按分类名聚合商品数量；空分类名不计入
pub fn derive_categories(products: &[Product]) -> Vec<CategorySummary> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for product in products {
        let name = product.category.trim();
        if !name.is_empty() {
            *counts.entry(name).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(name, product_count)| CategorySummary {
            name: name.to_string(),
            description: format!("{} products", name),
            product_count,
        })
        .collect()
}

/// 未读通知（`read == false`），保持快照顺序，最多 `limit` 条
pub fn unread_feed(notifications: &[Notification], limit: usize) -> Vec<NotificationView> {
    notifications
        .iter()
        .filter(|n| n.is_unread())
        .take(limit)
        .cloned()
        .map(NotificationView::from)
        .collect()
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| n.is_unread()).count()
}

/// 已读历史（`read == true`），保持快照顺序
pub fn read_history(notifications: &[Notification]) -> Vec<NotificationView> {
    notifications
        .iter()
        .filter(|n| n.is_read())
        .cloned()
        .map(NotificationView::from)
        .collect()
}

/// 幻灯片游标，两端循环
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideCursor {
    index: usize,
    len: usize,
}

impl SlideCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn at(index: usize, len: usize) -> Self {
        let index = if len == 0 { 0 } else { index % len };
        Self { index, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn next_index(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            (self.index + 1) % self.len
        }
    }

    pub fn prev_index(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            (self.index + self.len - 1) % self.len
        }
    }

    pub fn advance(&mut self) {
        self.index = self.next_index();
    }

    pub fn retreat(&mut self) {
        self.index = self.prev_index();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str, name: &str, category: &str, stock: f64) -> Product {
        Product {
            product_id: id.to_string(),
            product_name: name.to_string(),
            category: category.to_string(),
            stock_quantity: stock,
            ..Default::default()
        }
    }

    fn notification(id: &str, read: Option<bool>) -> Notification {
        let mut value = json!({"id": id});
        if let Some(read) = read {
            value["read"] = json!(read);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_search_matches_name_or_id_case_insensitively() {
        let products = vec![
            product("TK-01", "Teak Chair", "Furniture", 4.0),
            product("OK-02", "Oak Table", "Furniture", 20.0),
        ];
        assert_eq!(search_products(&products, "teak").len(), 1);
        assert_eq!(search_products(&products, "ok-").len(), 1);
        assert_eq!(search_products(&products, "").len(), 2);
        assert_eq!(search_products(&products, " chair").len(), 1);
        assert!(search_products(&products, "  ").is_empty());
        assert!(search_products(&products, "walnut").is_empty());
    }

    #[test]
    fn test_pager_bounds() {
        let mut pager = Pager::new(10);
        assert_eq!(pager.total_pages(0), 0);
        pager.next(0);
        assert_eq!(pager.page(), 1);

        pager.go_to(99, 25);
        assert_eq!(pager.page(), 3);
        pager.next(25);
        assert_eq!(pager.page(), 3);

        pager.go_to(0, 25);
        assert_eq!(pager.page(), 1);
        pager.prev();
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn test_last_page_holds_remainder() {
        let items: Vec<usize> = (0..25).collect();
        let mut pager = Pager::new(10);
        pager.go_to(3, items.len());
        let page = pager.slice(&items);
        assert_eq!(page.data, vec![20, 21, 22, 23, 24]);
        assert!(!page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn test_dashboard_low_stock_preview_is_capped() {
        let products: Vec<Product> = (0..8)
            .map(|i| product(&format!("P-{}", i), "Plank", "Timber", i as f64))
            .collect();
        let stats = dashboard_stats(&products, 7.0);
        assert_eq!(stats.total_products, 8);
        assert_eq!(stats.total_categories, 1);
        assert_eq!(stats.low_stock_count, 7);
        assert_eq!(stats.low_stock_preview.len(), LOW_STOCK_PREVIEW);
    }

    #[test]
    fn test_categories_are_counted_and_sorted() {
        let products = vec![
            product("1", "a", "Timber", 1.0),
            product("2", "b", "Furniture", 1.0),
            product("3", "c", "Timber", 1.0),
            product("4", "d", "", 1.0),
        ];
        let categories = derive_categories(&products);
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Furniture");
        assert_eq!(categories[1].product_count, 2);
    }

    #[test]
    fn test_notification_views_ignore_missing_read_flag() {
        let notifications = vec![
            notification("1", Some(false)),
            notification("2", None),
            notification("3", Some(true)),
            notification("4", Some(false)),
        ];
        let unread = unread_feed(&notifications, 5);
        assert_eq!(
            unread.iter().map(|v| v.notification.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "4"]
        );
        assert_eq!(unread_feed(&notifications, 1).len(), 1);
        assert_eq!(unread_count(&notifications), 2);
        assert_eq!(read_history(&notifications).len(), 1);
    }

    #[test]
    fn test_slide_cursor_wraps() {
        let mut cursor = SlideCursor::new(3);
        cursor.retreat();
        assert_eq!(cursor.index(), 2);
        cursor.advance();
        assert_eq!(cursor.index(), 0);
        assert_eq!(SlideCursor::at(7, 3).index(), 1);
        assert_eq!(SlideCursor::new(0).next_index(), 0);
    }
}
