use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A scoring dimension such as SEO or Performance. `slug` joins against the
/// weight table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A single check. `weight` is informational and not used by the arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub weight: f64,
}

/// In-memory reference data for one scoring run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: HashMap<i64, Category>,
    checks: HashMap<i64, Check>,
}

impl Catalog {
    pub fn new(categories: Vec<Category>, checks: Vec<Check>) -> Self {
        let categories: HashMap<i64, Category> =
            categories.into_iter().map(|c| (c.id, c)).collect();
        let checks: HashMap<i64, Check> = checks.into_iter().map(|c| (c.id, c)).collect();
        let orphans = checks
            .values()
            .filter(|c| !categories.contains_key(&c.category_id))
            .count();
        if orphans > 0 {
            tracing::warn!(orphans, "Catalog has checks pointing at unknown categories");
        }
        Self { categories, checks }
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn check(&self, id: i64) -> Option<&Check> {
        self.checks.get(&id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }
}

/// One line of seed data: category slug, display name, check name, weight.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedEntry {
    pub category_slug: String,
    pub category_name: String,
    pub check_name: String,
    pub check_weight: f64,
}

const DEFAULT_SEED: &[(&str, &str, &[&str])] = &[
    ("seo", "SEO", &["Title tag", "Meta description", "Canonical URL", "Heading structure", "Robots directives"]),
    ("performance", "Performance", &["Largest contentful paint", "Total blocking time", "Image compression", "Render-blocking resources"]),
    ("accessibility", "Accessibility", &["Image alt text", "Color contrast", "Form labels", "Document language"]),
    ("security", "Security", &["HTTPS", "HSTS header", "Content security policy", "Mixed content"]),
    ("best_practices", "Best Practices", &["Console errors", "Deprecated APIs", "Doctype"]),
    ("mobile", "Mobile", &["Viewport meta tag", "Tap target size", "Font size legibility"]),
    ("content", "Content", &["Thin content", "Duplicate content", "Broken links"]),
];

/// Built-in catalog used when no CSV seed is configured.
pub fn default_seed() -> Vec<SeedEntry> {
    DEFAULT_SEED
        .iter()
        .flat_map(|(slug, name, checks)| {
            checks.iter().map(move |check| SeedEntry {
                category_slug: (*slug).to_string(),
                category_name: (*name).to_string(),
                check_name: (*check).to_string(),
                check_weight: 1.0,
            })
        })
        .collect()
}

/// Parse seed CSV: `category_slug,category_name,check_name[,check_weight]`
/// with a header row. Returns the 1-based line number and reason on the
/// first malformed line.
pub fn parse_seed_csv(content: &str) -> Result<Vec<SeedEntry>, (usize, String)> {
    let mut entries = Vec::new();
    for (idx, line) in content.lines().enumerate().skip(1) {
        // skip header
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.splitn(4, ',').map(str::trim).collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return Err((idx + 1, "expected at least slug, name and check".to_string()));
        }
        let check_weight = match parts.get(3) {
            Some(w) if !w.is_empty() => w
                .parse::<f64>()
                .map_err(|_| (idx + 1, format!("invalid check weight '{w}'")))?,
            _ => 1.0,
        };
        entries.push(SeedEntry {
            category_slug: parts[0].to_string(),
            category_name: parts[1].to_string(),
            check_name: parts[2].to_string(),
            check_weight,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: i64, slug: &str) -> Category {
        Category { id, name: slug.to_uppercase(), slug: slug.to_string() }
    }

    #[test]
    fn lookup_by_id() {
        let catalog = Catalog::new(
            vec![cat(1, "seo"), cat(2, "performance")],
            vec![Check { id: 10, category_id: 1, name: "Title tag".into(), weight: 1.0 }],
        );
        assert_eq!(catalog.category(1).map(|c| c.slug.as_str()), Some("seo"));
        assert_eq!(catalog.check(10).map(|c| c.category_id), Some(1));
        assert!(catalog.check(11).is_none());
        assert_eq!(catalog.category_count(), 2);
        assert_eq!(catalog.check_count(), 1);
    }

    #[test]
    fn default_seed_covers_all_dimensions() {
        let seed = default_seed();
        let mut slugs: Vec<&str> = seed.iter().map(|e| e.category_slug.as_str()).collect();
        slugs.dedup();
        assert_eq!(
            slugs,
            vec!["seo", "performance", "accessibility", "security", "best_practices", "mobile", "content"]
        );
    }

    #[test]
    fn csv_with_optional_weight() {
        let csv = "slug,name,check,weight\nseo,SEO,Title tag,2.5\nmobile,Mobile,Viewport\n\n";
        let entries = parse_seed_csv(csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].check_weight, 2.5);
        assert_eq!(entries[1].category_slug, "mobile");
        assert_eq!(entries[1].check_weight, 1.0);
    }

    #[test]
    fn csv_reports_malformed_line() {
        let csv = "slug,name,check\nseo,SEO,Title\nperformance,,LCP\n";
        assert_eq!(parse_seed_csv(csv).unwrap_err().0, 3);

        let csv = "slug,name,check,weight\nseo,SEO,Title,heavy\n";
        let (line, reason) = parse_seed_csv(csv).unwrap_err();
        assert_eq!(line, 2);
        assert!(reason.contains("heavy"));
    }
}
