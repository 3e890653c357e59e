//! Fashion scene catalog and preview filters

use serde::Serialize;

/// Longest style id accepted from a client
pub const MAX_STYLE_LEN: usize = 64;

/// A selectable scene
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FashionStyle {
    pub id: &'static str,
    pub name: &'static str,
}

pub static FASHION_STYLES: [FashionStyle; 11] = [
    FashionStyle { id: "studio-soft-light", name: "Soft-light studio" },
    FashionStyle { id: "studio-minimal-backdrop", name: "Minimal backdrop studio" },
    FashionStyle { id: "luxury-cafe", name: "Luxury cafe" },
    FashionStyle { id: "shopping-mall", name: "Shopping mall" },
    FashionStyle { id: "garden", name: "Garden" },
    FashionStyle { id: "park", name: "Park" },
    FashionStyle { id: "mansion", name: "Luxury mansion" },
    FashionStyle { id: "urban-street", name: "Upscale walking street" },
    FashionStyle { id: "sea", name: "Seaside" },
    FashionStyle { id: "homestay", name: "Indoor homestay" },
    FashionStyle { id: "apartment", name: "Minimal apartment" },
];

/// Catalog entry as served to the page
#[derive(Debug, Clone, Serialize)]
pub struct StyleView {
    pub id: &'static str,
    pub name: &'static str,
    pub filter: &'static str,
}

/// Look up a scene by id
pub fn find(id: &str) -> Option<&'static FashionStyle> {
    FASHION_STYLES.iter().find(|s| s.id == id)
}

/// CSS filter used for the client-side preview of a style.
///
/// Purely cosmetic; most ids map to `none`.
pub fn preview_filter(style: &str) -> &'static str {
    match style {
        "vintage" => "sepia(0.5) contrast(1.2)",
        "modern" => "contrast(1.1) brightness(1.1)",
        "gothic" => "contrast(1.3) brightness(0.8)",
        _ => "none",
    }
}

pub fn catalog() -> Vec<StyleView> {
    FASHION_STYLES
        .iter()
        .map(|s| StyleView {
            id: s.id,
            name: s.name,
            filter: preview_filter(s.id),
        })
        .collect()
}

/// Style id reduced to characters that are safe inside a file name
pub fn file_safe(style: &str) -> String {
    style
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_are_unique() {
        let mut ids: Vec<_> = FASHION_STYLES.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), FASHION_STYLES.len());
    }

    #[test]
    fn test_preview_filter() {
        assert_eq!(preview_filter("vintage"), "sepia(0.5) contrast(1.2)");
        assert_eq!(preview_filter("gothic"), "contrast(1.3) brightness(0.8)");
        assert_eq!(preview_filter("garden"), "none");
        assert_eq!(preview_filter(""), "none");
    }

    #[test]
    fn test_find() {
        assert_eq!(find("sea").map(|s| s.name), Some("Seaside"));
        assert!(find("moon").is_none());
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("luxury-cafe"), "luxury-cafe");
        assert_eq!(file_safe("a b/../c"), "a-b----c");
        assert_eq!(file_safe("phố_đi"), "ph-_-i");
    }
}
