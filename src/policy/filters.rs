use crate::config::FilterConfig;
use crate::types::ItemMeta;

/// Category / name-keyword blacklist applied before scoring. Matching is
/// case-insensitive; categories match exactly, keywords as substrings.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    categories: Vec<String>,
    keywords: Vec<String>,
}

impl ItemFilter {
    pub fn new(cfg: &FilterConfig) -> Self {
        Self {
            categories: cfg.category_blacklist.iter().map(|c| c.to_lowercase()).collect(),
            keywords: cfg.keyword_blacklist.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Why the item is excluded, or None if it may proceed.
    pub fn exclusion_reason(&self, item_name: &str, meta: &ItemMeta) -> Option<String> {
        if let Some(category) = meta.category.as_deref() {
            let lowered = category.trim().to_lowercase();
            if self.categories.iter().any(|c| *c == lowered) {
                return Some(format!("Blacklisted category ({category})"));
            }
        }

        let name = item_name.to_lowercase();
        self.keywords
            .iter()
            .find(|k| name.contains(k.as_str()))
            .map(|k| format!("Blacklisted keyword ({k})"))
    }
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(category: Option<&str>) -> ItemMeta {
        ItemMeta {
            category: category.map(str::to_string),
            trade_lock_days: 0,
        }
    }

    #[test]
    fn blacklisted_category_is_excluded() {
        let filter = ItemFilter::default();
        let reason = filter.exclusion_reason("Sticker | Crown (Foil)", &meta(Some("sticker")));
        assert_eq!(reason.as_deref(), Some("Blacklisted category (sticker)"));
    }

    #[test]
    fn blacklisted_keyword_is_excluded() {
        let filter = ItemFilter::default();
        let reason = filter.exclusion_reason("Sealed Graffiti | Lambda (Blood Red)", &meta(None));
        assert!(reason.unwrap().starts_with("Blacklisted keyword"));
    }

    #[test]
    fn weapon_skins_pass() {
        let filter = ItemFilter::default();
        assert!(filter
            .exclusion_reason("AK-47 | Redline (Field-Tested)", &meta(Some("Rifle")))
            .is_none());
    }
}
