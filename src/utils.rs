use uuid::Uuid;

/// Turn a title into a URL-safe slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;

    for c in title.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "article".to_string()
    } else {
        slug
    }
}

/// Short random suffix appended to slugs so no uniqueness pre-check against
/// existing articles is needed.
pub fn random_slug_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

/// Deterministic default cover image per category, with a final fallback for
/// categories without a dedicated default.
pub fn default_image_for_category(category_slug: &str) -> &'static str {
    match category_slug {
        "tech" | "technology" => "/images/defaults/tech.jpg",
        "business" | "economy" => "/images/defaults/business.jpg",
        "sports" => "/images/defaults/sports.jpg",
        "world" => "/images/defaults/world.jpg",
        "politics" => "/images/defaults/politics.jpg",
        "culture" => "/images/defaults/culture.jpg",
        _ => "/images/defaults/news.jpg",
    }
}
