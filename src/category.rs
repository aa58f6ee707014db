//! Fixed bijection between page/product labels and the codes the model was trained on.

use std::collections::HashMap;

use crate::error::{AnalyticsError, Result};

/// Feature that takes a category label from the user instead of a raw value.
pub const CATEGORY_FEATURE: &str = "page_or_product";

const PAGE_OR_PRODUCT: [(i64, &str); 33] = [
    (0, "about_us"),
    (1, "account"),
    (2, "Area Rug"),
    (3, "Audio Equipment"),
    (4, "Bedding"),
    (5, "blog"),
    (6, "category_audio"),
    (7, "category_furniture"),
    (8, "category_gaming"),
    (9, "category_kitchen"),
    (10, "category_laptops"),
    (11, "category_smart_home"),
    (12, "category_smartphones"),
    (13, "category_tvs"),
    (14, "checkout"),
    (15, "Computer Accessories"),
    (16, "Cookware"),
    (17, "Desktop Computers"),
    (18, "Furniture"),
    (19, "Gaming"),
    (20, "home"),
    (21, "Kitchen Appliances"),
    (22, "Laptops"),
    (23, "order_history"),
    (24, "product_listing"),
    (25, "search_results"),
    (26, "Smart Home"),
    (27, "Smartphones"),
    (28, "store_locator"),
    (29, "support"),
    (30, "Tablets"),
    (31, "TVs"),
    (32, "wishlist"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCodeMap {
    entries: Vec<(i64, String)>,
    by_label: HashMap<String, i64>,
    by_code: HashMap<i64, String>,
}

impl CategoryCodeMap {
    /// Build from `(code, label)` pairs, rejecting duplicate codes or labels.
    pub fn new<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, S)>,
        S: Into<String>,
    {
        let mut entries = Vec::new();
        let mut by_label = HashMap::new();
        let mut by_code = HashMap::new();

        for (code, label) in pairs {
            let label = label.into();
            if by_code.insert(code, label.clone()).is_some() {
                return Err(AnalyticsError::artifact(
                    "category map",
                    format!("duplicate code {code}"),
                ));
            }
            if by_label.insert(label.clone(), code).is_some() {
                return Err(AnalyticsError::artifact(
                    "category map",
                    format!("duplicate label {label:?}"),
                ));
            }
            entries.push((code, label));
        }

        Ok(Self {
            entries,
            by_label,
            by_code,
        })
    }

    /// The page/product table the shipped model uses.
    pub fn page_or_product() -> Self {
        let entries: Vec<(i64, String)> = PAGE_OR_PRODUCT
            .iter()
            .map(|&(code, label)| (code, label.to_string()))
            .collect();
        let by_label = entries.iter().map(|(c, l)| (l.clone(), *c)).collect();
        let by_code = entries.iter().map(|(c, l)| (*c, l.clone())).collect();
        Self {
            entries,
            by_label,
            by_code,
        }
    }

    pub fn label_to_code(&self, label: &str) -> Result<i64> {
        self.by_label
            .get(label)
            .copied()
            .ok_or_else(|| AnalyticsError::UnknownCategory(label.to_string()))
    }

    pub fn code_to_label(&self, code: i64) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    /// Labels in table order, for presenting choices.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, label)| label.as_str())
    }

    pub fn entries(&self) -> &[(i64, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_label_round_trips() {
        let map = CategoryCodeMap::page_or_product();
        assert_eq!(map.len(), 33);
        for label in map.labels() {
            let code = map.label_to_code(label).unwrap();
            assert_eq!(map.code_to_label(code), Some(label));
        }
    }

    #[test]
    fn labels_are_case_sensitive() {
        let map = CategoryCodeMap::page_or_product();
        assert_eq!(map.label_to_code("TVs").unwrap(), 31);
        assert!(matches!(
            map.label_to_code("tvs"),
            Err(AnalyticsError::UnknownCategory(label)) if label == "tvs"
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        assert!(CategoryCodeMap::new([(0, "home"), (0, "blog")]).is_err());
        assert!(CategoryCodeMap::new([(0, "home"), (1, "home")]).is_err());
        let map = CategoryCodeMap::new([(5, "a"), (9, "b")]).unwrap();
        assert_eq!(map.label_to_code("b").unwrap(), 9);
        assert_eq!(map.code_to_label(4), None);
    }
}
