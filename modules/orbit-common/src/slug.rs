/// Derive the canonical slug for an entity title: lowercase, every run of
/// non-alphanumeric characters collapsed to a single `-`, no leading or
/// trailing dashes. Two titles with the same normalized form collide by
/// design and share one entity.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
