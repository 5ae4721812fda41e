use serde::{Deserialize, Serialize};

pub mod category;
pub mod material;
pub mod recipe;

pub use category::{CategoryChanges, CategoryRow, NewCategory};
pub use material::{MaterialPayload, MaterialRow, MaterialView, NewMaterial};
pub use recipe::{
    NewRecipe, RecipeChanges, RecipeDraft, RecipeId, RecipeMaterialRow, RecipeMaterialView,
    RecipePayload, RecipeRow, RecipeTotals, RecipeView,
};

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;
// keeps `offset()` inside i64 for every page size
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Query string of the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    /// Category filter, with `all` meaning no filter.
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
    }

    /// `LIKE` pattern for the name search.
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let escaped = s
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                format!("%{escaped}%")
            })
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(query: &ListQuery, total: i64) -> Self {
        let limit = query.limit();
        Self {
            page: query.page(),
            limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// JSON body of every successful response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    pub fn new(message: &'static str, data: T) -> Self {
        Self {
            message,
            data,
            pagination: None,
        }
    }

    pub fn paged(message: &'static str, data: T, pagination: Pagination) -> Self {
        Self {
            message,
            data,
            pagination: Some(pagination),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MaterialStats {
    pub total_materials: i64,
    pub new_materials: i64,
    pub category_stats: Vec<CategoryCount>,
}

#[derive(Debug, Serialize)]
pub struct RecipeStats {
    pub total_recipes: i64,
    pub my_recipes: i64,
    pub total_materials: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<i64>, limit: Option<i64>) -> ListQuery {
        ListQuery {
            page,
            limit,
            ..ListQuery::default()
        }
    }

    #[test]
    fn paging_defaults_and_clamps() {
        let first = query(None, None);
        assert_eq!((first.page(), first.limit(), first.offset()), (1, 10, 0));

        let third = query(Some(3), Some(25));
        assert_eq!(third.offset(), 50);

        let silly = query(Some(-2), Some(10_000));
        assert_eq!((silly.page(), silly.limit()), (1, 100));
    }

    #[test]
    fn huge_page_does_not_overflow_offset() {
        for limit in [Some(1), Some(10), Some(100), Some(i64::MAX)] {
            let last = query(Some(i64::MAX), limit);

            assert_eq!(last.page(), MAX_PAGE);
            assert!(last.offset() >= 0);
            assert_eq!(last.offset(), (MAX_PAGE - 1) * last.limit());
        }
    }

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(&query(Some(2), Some(10)), 21).total_pages, 3);
        assert_eq!(Pagination::new(&query(None, None), 0).total_pages, 0);
        assert_eq!(Pagination::new(&query(None, Some(5)), 5).total_pages, 1);
    }

    #[test]
    fn all_means_no_category_filter() {
        let mut list = ListQuery::default();
        assert_eq!(list.category(), None);

        list.category = Some("ALL".to_string());
        assert_eq!(list.category(), None);

        list.category = Some("Low-Carb".to_string());
        assert_eq!(list.category(), Some("Low-Carb"));
    }

    #[test]
    fn search_is_escaped_for_like() {
        let list = ListQuery {
            search: Some(" 100%_oat ".to_string()),
            ..ListQuery::default()
        };

        assert_eq!(list.search_pattern().as_deref(), Some("%100\\%\\_oat%"));
        assert_eq!(ListQuery::default().search_pattern(), None);
    }
}
